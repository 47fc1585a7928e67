//! Shutdown monitor.
//!
//! # State Transitions
//! ```text
//! Running → ShutdownRequested: shutdown signal closed
//! ShutdownRequested → Draining: stop hooks begin (reverse build order)
//! Draining → Stopped: all hooks stopped, failed or abandoned at the deadline
//! Stopped: finish signal closed
//! ```
//!
//! # Design Decisions
//! - Runs on its own task and blocks only on the shutdown signal
//! - Teardown is bounded by a global deadline
//! - The finish signal is closed even when teardown was unclean

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::lifecycle::manager::{LifecycleManager, StopReport};
use crate::lifecycle::shutdown::{FinishSignal, ShutdownSignal};

/// Monitor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    ShutdownRequested,
    Draining,
    Stopped,
}

/// Bridges the shutdown signal to ordered teardown.
pub struct ShutdownMonitor {
    lifecycle: LifecycleManager,
    shutdown: ShutdownSignal,
    finish: FinishSignal,
    deadline: Duration,
}

impl ShutdownMonitor {
    /// `deadline` bounds the whole teardown, measured from the shutdown request.
    pub fn new(lifecycle: LifecycleManager, shutdown: ShutdownSignal, deadline: Duration) -> Self {
        Self {
            lifecycle,
            shutdown,
            finish: FinishSignal::new(),
            deadline,
        }
    }

    pub fn finish_signal(&self) -> FinishSignal {
        self.finish.clone()
    }

    /// Move the monitor onto its own task.
    pub fn spawn(self) -> MonitorHandle {
        let (state_tx, state_rx) = watch::channel(MonitorState::Running);
        let transitions = Arc::new(Mutex::new(vec![MonitorState::Running]));
        let finish = self.finish.clone();
        let task = tokio::spawn(self.run(state_tx, transitions.clone()));
        MonitorHandle {
            finish,
            state: state_rx,
            transitions,
            task,
        }
    }

    async fn run(
        mut self,
        state: watch::Sender<MonitorState>,
        transitions: Arc<Mutex<Vec<MonitorState>>>,
    ) -> StopReport {
        let enter = |next: MonitorState| {
            if let Ok(mut log) = transitions.lock() {
                log.push(next);
            }
            state.send_replace(next);
            tracing::debug!(state = ?next, "Shutdown monitor transition");
        };

        let reason = self.shutdown.triggered().await;
        enter(MonitorState::ShutdownRequested);
        tracing::info!(
            reason = %reason,
            hooks = self.lifecycle.started_count(),
            deadline = ?self.deadline,
            "Stopping lifecycle hooks"
        );

        let deadline = Instant::now() + self.deadline;
        enter(MonitorState::Draining);
        let report = self.lifecycle.stop_until(Some(deadline)).await;

        if report.is_clean() {
            tracing::info!(stopped = report.stopped.len(), "All lifecycle hooks stopped");
        } else {
            tracing::warn!(report = %report, "Lifecycle teardown finished with failures");
        }

        enter(MonitorState::Stopped);
        self.finish.close();
        report
    }
}

/// Handle to a running monitor.
pub struct MonitorHandle {
    finish: FinishSignal,
    state: watch::Receiver<MonitorState>,
    transitions: Arc<Mutex<Vec<MonitorState>>>,
    task: JoinHandle<StopReport>,
}

impl MonitorHandle {
    pub fn finish_signal(&self) -> FinishSignal {
        self.finish.clone()
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Every state entered so far, starting with `Running`.
    pub fn transitions(&self) -> Vec<MonitorState> {
        self.transitions
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Wait for teardown to finish and return its report.
    pub async fn join(self) -> StopReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Shutdown monitor task failed");
                self.finish.close();
                StopReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CapabilityKey;
    use crate::lifecycle::{Hook, LifecycleTimeouts, ShutdownReason};

    struct Journal;
    struct Stuck;

    #[tokio::test]
    async fn test_state_machine_and_single_finish() {
        let hooks = vec![(CapabilityKey::of::<Journal>(), Hook::new().on_stop(|| async { Ok(()) }))];
        let mut lifecycle = LifecycleManager::new(hooks, LifecycleTimeouts::default());
        lifecycle.start().await.unwrap();

        let shutdown = ShutdownSignal::new();
        let handle = ShutdownMonitor::new(lifecycle, shutdown.clone(), Duration::from_secs(5)).spawn();
        let finish = handle.finish_signal();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.state(), MonitorState::Running);
        assert!(!finish.is_closed());

        assert!(shutdown.trigger(ShutdownReason::Rpc));
        assert!(!shutdown.trigger(ShutdownReason::Signal("SIGINT")));

        tokio::time::timeout(Duration::from_secs(2), finish.wait())
            .await
            .expect("finish signal closed");
        assert_eq!(
            handle.transitions(),
            vec![
                MonitorState::Running,
                MonitorState::ShutdownRequested,
                MonitorState::Draining,
                MonitorState::Stopped,
            ]
        );
        assert!(!finish.close());

        let report = handle.join().await;
        assert!(report.is_clean());
        assert_eq!(report.stopped, vec![CapabilityKey::of::<Journal>()]);
    }

    #[tokio::test]
    async fn test_stuck_hook_does_not_block_finish() {
        let hooks = vec![
            (CapabilityKey::of::<Journal>(), Hook::new().on_stop(|| async { Ok(()) })),
            (CapabilityKey::of::<Stuck>(), Hook::new().on_stop(|| futures_util::future::pending())),
        ];
        let timeouts = LifecycleTimeouts {
            start: Duration::from_secs(1),
            stop: Duration::from_secs(60),
        };
        let mut lifecycle = LifecycleManager::new(hooks, timeouts);
        lifecycle.start().await.unwrap();

        let shutdown = ShutdownSignal::new();
        let handle = ShutdownMonitor::new(lifecycle, shutdown.clone(), Duration::from_millis(100)).spawn();
        let finish = handle.finish_signal();
        shutdown.trigger(ShutdownReason::Signal("SIGTERM"));

        tokio::time::timeout(Duration::from_secs(2), finish.wait())
            .await
            .expect("finish fires after the global deadline");
        let report = handle.join().await;
        assert_eq!(report.timed_out(), vec![CapabilityKey::of::<Stuck>()]);
        assert_eq!(report.failures.len(), 2);
    }
}
