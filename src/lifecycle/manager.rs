//! Start/stop sequencing for stateful capabilities.
//!
//! # Responsibilities
//! - Start hooks in build order, one at a time
//! - Roll back already-started hooks if a start fails
//! - Stop started hooks in exact reverse order, collecting every failure
//!
//! # Design Decisions
//! - Each start and stop call is bounded by its own timeout
//! - A stop error never short-circuits the remaining stops
//! - A hook is stopped at most once: stopping drains the started list

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, Instant};

use crate::composition::{BoxError, CapabilityKey};
use crate::lifecycle::hook::{Hook, HookFn};
use crate::observability::metrics;

/// Per-hook time bounds.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleTimeouts {
    pub start: Duration,
    pub stop: Duration,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            start: Duration::from_secs(30),
            stop: Duration::from_secs(10),
        }
    }
}

/// Why a hook did not stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopFailureKind {
    /// The stop function returned an error.
    Error(String),
    /// The stop function exceeded its bound and was abandoned.
    TimedOut(Duration),
    /// The global deadline passed before the hook's turn.
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct StopFailure {
    pub key: CapabilityKey,
    pub kind: StopFailureKind,
}

impl fmt::Display for StopFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StopFailureKind::Error(msg) => write!(f, "{}: {}", self.key, msg),
            StopFailureKind::TimedOut(after) => {
                write!(f, "{}: failed to stop cleanly within {:?}", self.key, after)
            }
            StopFailureKind::Abandoned => write!(f, "{}: abandoned at shutdown deadline", self.key),
        }
    }
}

/// Aggregate outcome of a stop pass.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    /// Hooks stopped cleanly, in the order they were stopped.
    pub stopped: Vec<CapabilityKey>,
    pub failures: Vec<StopFailure>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Keys whose stop function exceeded its timeout.
    pub fn timed_out(&self) -> Vec<CapabilityKey> {
        self.failures
            .iter()
            .filter(|f| matches!(f.kind, StopFailureKind::TimedOut(_)))
            .map(|f| f.key)
            .collect()
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stopped, {} failed", self.stopped.len(), self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A start function failed; earlier hooks were rolled back.
    #[error("start hook for {key} failed: {source}")]
    Start {
        key: CapabilityKey,
        #[source]
        source: BoxError,
        rollback: StopReport,
    },

    /// A start function did not return in time; earlier hooks were rolled back.
    #[error("start hook for {key} did not return within {timeout:?}")]
    StartTimeout {
        key: CapabilityKey,
        timeout: Duration,
        rollback: StopReport,
    },

    #[error("lifecycle hooks were already started")]
    AlreadyStarted,

    /// Teardown finished with failures.
    #[error("shutdown incomplete: {0}")]
    Shutdown(StopReport),
}

/// Runs hooks collected by the injector.
pub struct LifecycleManager {
    pending: Vec<(CapabilityKey, Hook)>,
    started: Vec<(CapabilityKey, Option<HookFn>)>,
    timeouts: LifecycleTimeouts,
    has_started: bool,
}

impl LifecycleManager {
    /// `hooks` must already be in build order.
    pub fn new(hooks: Vec<(CapabilityKey, Hook)>, timeouts: LifecycleTimeouts) -> Self {
        Self {
            pending: hooks,
            started: Vec::new(),
            timeouts,
            has_started: false,
        }
    }

    pub fn timeouts(&self) -> LifecycleTimeouts {
        self.timeouts
    }

    /// Number of hooks currently started (and therefore due a stop).
    pub fn started_count(&self) -> usize {
        self.started.len()
    }

    /// Start every hook in order. On failure, stop the started ones in reverse.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if self.has_started {
            return Err(LifecycleError::AlreadyStarted);
        }
        self.has_started = true;

        let hooks = std::mem::take(&mut self.pending);
        let total = hooks.len();
        for (key, hook) in hooks {
            let (start, stop) = hook.into_parts();
            if let Some(start) = start {
                tracing::debug!(capability = %key, "Starting");
                match time::timeout(self.timeouts.start, start()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(source)) => {
                        tracing::error!(capability = %key, error = %source, "Start hook failed, rolling back");
                        let rollback = self.stop().await;
                        return Err(LifecycleError::Start {
                            key,
                            source,
                            rollback,
                        });
                    }
                    Err(_) => {
                        tracing::error!(
                            capability = %key,
                            timeout = ?self.timeouts.start,
                            "Start hook timed out, rolling back"
                        );
                        let rollback = self.stop().await;
                        return Err(LifecycleError::StartTimeout {
                            key,
                            timeout: self.timeouts.start,
                            rollback,
                        });
                    }
                }
            }
            self.started.push((key, stop));
            metrics::record_hooks_started(self.started.len());
        }

        tracing::info!(hooks = total, "Lifecycle hooks started");
        Ok(())
    }

    /// Stop every started hook in reverse start order.
    pub async fn stop(&mut self) -> StopReport {
        self.stop_until(None).await
    }

    /// Like [`stop`](Self::stop), but no hook may run past `deadline`.
    ///
    /// Hooks whose turn comes after the deadline are reported as abandoned.
    pub async fn stop_until(&mut self, deadline: Option<Instant>) -> StopReport {
        let mut report = StopReport::default();

        while let Some((key, stop)) = self.started.pop() {
            metrics::record_hooks_started(self.started.len());
            let Some(stop) = stop else {
                report.stopped.push(key);
                continue;
            };

            let budget = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        tracing::warn!(capability = %key, "Shutdown deadline passed, abandoning stop hook");
                        metrics::record_stop_failure("abandoned");
                        report.failures.push(StopFailure {
                            key,
                            kind: StopFailureKind::Abandoned,
                        });
                        continue;
                    }
                    left.min(self.timeouts.stop)
                }
                None => self.timeouts.stop,
            };

            tracing::debug!(capability = %key, "Stopping");
            match time::timeout(budget, stop()).await {
                Ok(Ok(())) => report.stopped.push(key),
                Ok(Err(e)) => {
                    tracing::warn!(capability = %key, error = %e, "Stop hook failed");
                    metrics::record_stop_failure("error");
                    report.failures.push(StopFailure {
                        key,
                        kind: StopFailureKind::Error(e.to_string()),
                    });
                }
                Err(_) => {
                    tracing::warn!(capability = %key, timeout = ?budget, "Failed to stop cleanly");
                    metrics::record_stop_failure("timeout");
                    report.failures.push(StopFailure {
                        key,
                        kind: StopFailureKind::TimedOut(budget),
                    });
                }
            }
        }

        report
    }
}
