//! Top-level daemon errors.
//!
//! Everything before serving begins is fatal and surfaces here with the
//! module or capability that failed.

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

use crate::composition::{CapabilityKey, ComposeError, GraphError, InjectError};
use crate::config::ConfigError;
use crate::lifecycle::LifecycleError;
use crate::observability::logging::LoggingError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Duplicate registration or a failing module.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Cycle, missing dependency or failed constructor.
    #[error(transparent)]
    Inject(#[from] InjectError),

    /// A capability the daemon needs is absent from the built graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// An invoke meant to extract `0` from the graph never ran.
    #[error("{0} was not populated from the object graph")]
    Unpopulated(CapabilityKey),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),
}
