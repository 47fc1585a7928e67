//! Shutdown coordination for the daemon.
//!
//! Two single-fire broadcasts: [`ShutdownSignal`] asks for teardown,
//! [`FinishSignal`] reports that teardown is over. Both can be cloned freely
//! and awaited by any number of tasks.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// What closed the shutdown signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal (SIGINT, SIGTERM).
    Signal(&'static str),
    /// An administrative RPC call.
    Rpc,
    /// A fatal internal error.
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {name}"),
            ShutdownReason::Rpc => f.write_str("rpc request"),
            ShutdownReason::Fatal(msg) => write!(f, "fatal error: {msg}"),
        }
    }
}

/// Process-wide shutdown trigger.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal. Returns `false` if it was already closed.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let description = reason.to_string();
        let mut reason = Some(reason);
        let fired = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = reason.take();
            true
        });

        if fired {
            tracing::info!(reason = %description, "Shutdown requested");
        } else {
            tracing::debug!("Shutdown already requested, ignoring trigger");
        }
        fired
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.tx.borrow().clone()
    }

    /// Wait until the signal is closed.
    pub async fn triggered(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(current) => current.clone(),
            Err(_) => None,
        };
        reason.unwrap_or_else(|| ShutdownReason::Fatal("shutdown channel dropped".to_string()))
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion broadcast closed once teardown is over.
#[derive(Clone)]
pub struct FinishSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl FinishSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|done| {
            if *done {
                return false;
            }
            *done = true;
            true
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal is closed.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl Default for FinishSignal {
    fn default() -> Self {
        Self::new()
    }
}
