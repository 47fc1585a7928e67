//! Pool-mode daemon control flow.
//!
//! # Phases
//! ```text
//! assemble: modules → registry → object graph → MarketNode extracted
//! serve:    start hooks → monitor spawned → proxy + router serve
//!           → shutdown signal → stop hooks (reverse) → finish → drain
//! ```
//!
//! Any failure before serving aborts with nothing exposed. After serving
//! starts, an unclean teardown is reported as [`LifecycleError::Shutdown`].

use std::sync::Arc;
use tokio::net::TcpListener;

use crate::composition::{compose, CapabilityKey, Injector, Module, ObjectGraph};
use crate::config::schema::MarketConfig;
use crate::error::DaemonError;
use crate::lifecycle::{
    signals::spawn_signal_listener, LifecycleError, LifecycleManager, ShutdownMonitor, ShutdownReason,
    ShutdownSignal,
};
use crate::node::api::MarketNode;
use crate::node::modules::{AuthModule, CoreModule, JournalModule, MarketApiModule, PieceStorageModule};
use crate::node::piece_store::FsPieceStore;
use crate::permission::{AuthVerifier, PermissionProxy};
use crate::rpc::{resource_route, RpcRouter, ServeOptions};

/// A fully built, not yet started daemon.
pub struct PoolDaemon {
    config: Arc<MarketConfig>,
    graph: ObjectGraph,
    lifecycle: LifecycleManager,
    node: Arc<MarketNode>,
    verifier: Arc<dyn AuthVerifier>,
    pieces: Arc<FsPieceStore>,
    shutdown: ShutdownSignal,
}

impl PoolDaemon {
    /// Compose every module and build the object graph. Nothing is started.
    pub fn assemble(config: MarketConfig, shutdown: ShutdownSignal) -> Result<Self, DaemonError> {
        let core = CoreModule::new(shutdown.clone());
        let api = MarketApiModule::new();
        let modules: [&dyn Module<MarketConfig>; 5] =
            [&core, &JournalModule, &AuthModule, &PieceStorageModule, &api];

        let registry = compose(&config, &modules)?;
        let assembly = Injector::build(registry)?;
        let (graph, lifecycle) = assembly.into_lifecycle(config.lifecycle.timeouts());

        let node = api
            .slot()
            .get()
            .ok_or(DaemonError::Unpopulated(CapabilityKey::of::<Arc<MarketNode>>()))?;
        let verifier = graph.get::<Arc<dyn AuthVerifier>>()?;
        let pieces = graph.get::<Arc<FsPieceStore>>()?;

        Ok(Self {
            config: Arc::new(config),
            graph,
            lifecycle,
            node,
            verifier,
            pieces,
            shutdown,
        })
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn node(&self) -> &Arc<MarketNode> {
        &self.node
    }

    /// Start every hook, serve on `listener` and tear down on shutdown.
    pub async fn serve(mut self, listener: TcpListener) -> Result<(), DaemonError> {
        self.lifecycle.start().await?;

        let monitor = ShutdownMonitor::new(
            self.lifecycle,
            self.shutdown.clone(),
            self.config.lifecycle.shutdown_deadline(),
        )
        .spawn();

        let proxy = PermissionProxy::new(self.node, MarketNode::permission_table(), self.verifier.clone());
        let mut router = RpcRouter::new(ServeOptions::from(&self.config.api));
        let served = match router.mount("/resource", resource_route(self.pieces)) {
            Ok(()) => {
                router
                    .serve(
                        listener,
                        &self.config.api.namespace,
                        self.verifier,
                        proxy,
                        monitor.finish_signal(),
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &served {
            tracing::error!(error = %e, "RPC server failed");
            self.shutdown.trigger(ShutdownReason::Fatal(e.to_string()));
        }

        let report = monitor.join().await;
        served?;
        if !report.is_clean() {
            return Err(LifecycleError::Shutdown(report).into());
        }
        tracing::info!("Daemon stopped");
        Ok(())
    }
}

/// Run the pool-mode daemon until it is shut down.
pub async fn run_pool(config: MarketConfig) -> Result<(), DaemonError> {
    let listener = TcpListener::bind(&config.api.listen)
        .await
        .map_err(|source| DaemonError::Bind {
            address: config.api.listen.clone(),
            source,
        })?;

    let shutdown = ShutdownSignal::new();
    let daemon = PoolDaemon::assemble(config, shutdown.clone())?;
    spawn_signal_listener(shutdown);
    daemon.serve(listener).await
}
