//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM
//! - Close the shutdown signal on the first one
//! - Force exit on the second one
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal means the operator gave up on graceful shutdown

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{ShutdownReason, ShutdownSignal};

/// Spawn the signal listener task.
pub fn spawn_signal_listener(shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = match wait_for_signal().await {
            Ok(name) => name,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };
        tracing::info!(signal = name, "Signal received, shutting down gracefully");
        shutdown.trigger(ShutdownReason::Signal(name));

        if let Ok(name) = wait_for_signal().await {
            tracing::warn!(signal = name, "Second signal received, forcing exit");
            std::process::exit(1);
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "CTRL-C")
}
