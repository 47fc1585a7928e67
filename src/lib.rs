//! Composition and lifecycle core of a modular storage-market daemon.
//!
//! Subsystem modules register capability providers; the injector resolves
//! them into an object graph; the lifecycle manager starts and stops
//! stateful resources in dependency order; the resulting API is served over
//! JSON-RPC behind a permission proxy.

pub mod composition;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod node;
pub mod observability;
pub mod permission;
pub mod rpc;

pub use config::schema::MarketConfig;
pub use error::DaemonError;
pub use node::{run_pool, PoolDaemon};
