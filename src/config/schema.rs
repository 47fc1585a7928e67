//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleTimeouts;
use crate::permission::TrustLevel;

/// Root configuration for the market daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MarketConfig {
    /// Deployment mode.
    pub mode: RunMode,

    /// Home directory for journal and local state.
    pub home: PathBuf,

    /// RPC listener settings.
    pub api: ApiConfig,

    /// Auth service endpoint and local tokens.
    pub auth: AuthConfig,

    /// Chain node endpoint.
    pub node: EndpointConfig,

    /// Message service endpoint.
    pub messager: EndpointConfig,

    /// Signing backend.
    pub signer: SignerConfig,

    /// Gateway endpoint.
    pub gateway: EndpointConfig,

    /// Database connection.
    pub mysql: MysqlConfig,

    /// Piece storage backends.
    pub piece_storage: PieceStorageConfig,

    /// Data-transfer concurrency limits.
    pub transfers: TransferConfig,

    /// Default payment settings.
    pub payment: PaymentConfig,

    /// Miners served by this daemon.
    pub miners: Vec<MinerConfig>,

    pub journal: JournalConfig,

    pub lifecycle: LifecycleConfig,

    pub observability: ObservabilityConfig,
}

/// Deployment mode. Pool mode serves many miners and requires an auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Solo,
    #[default]
    Pool,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Solo => f.write_str("solo"),
            RunMode::Pool => f.write_str("pool"),
        }
    }
}

/// RPC listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address (e.g., "127.0.0.1:41235").
    pub listen: String,

    /// API namespace prefixed to every method name.
    pub namespace: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum requests handled concurrently.
    pub max_concurrent_requests: usize,

    /// Time in-flight requests get to finish after shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:41235".to_string(),
            namespace: "VENUS_MARKET".to_string(),
            request_timeout_secs: 60,
            max_body_bytes: 16 * 1024 * 1024,
            max_concurrent_requests: 1000,
            shutdown_grace_secs: 5,
        }
    }
}

/// Auth service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token verification service URL. Required in pool mode.
    pub url: String,

    /// Token this daemon presents to the auth service.
    pub token: String,

    /// How long a verified token is trusted without re-checking, in seconds.
    pub cache_ttl_secs: u64,

    /// Locally trusted tokens, checked before the remote service.
    pub tokens: Vec<StaticToken>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            cache_ttl_secs: 60,
            tokens: Vec::new(),
        }
    }
}

/// A bearer token accepted without contacting the auth service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticToken {
    pub token: String,
    pub name: String,
    pub level: TrustLevel,
}

/// URL plus bearer token for an upstream service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    Wallet,
    #[default]
    Gateway,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SignerConfig {
    pub kind: SignerKind,
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MysqlConfig {
    /// Connection string; empty selects the embedded store.
    pub dsn: String,
    pub max_open_conns: u32,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_open_conns: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PieceStorageConfig {
    /// Filesystem piece stores.
    pub fs: Vec<FsStoreConfig>,
}

/// One directory of pieces.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FsStoreConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    pub simultaneous_retrieval: u64,
    pub simultaneous_storage: u64,
    /// 0 means no per-client limit.
    pub simultaneous_storage_per_client: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            simultaneous_retrieval: 20,
            simultaneous_storage: 20,
            simultaneous_storage_per_client: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PaymentConfig {
    /// Default address receiving retrieval payments.
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MinerConfig {
    pub address: String,
    #[serde(default)]
    pub account: String,
}

/// Event journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    /// Events dropped before they reach the journal, as "system:event".
    pub disabled_events: Vec<String>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_events: Vec::new(),
        }
    }
}

/// Start/stop bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub start_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    /// Bound on the whole teardown.
    pub shutdown_deadline_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            start_timeout_secs: 30,
            stop_timeout_secs: 10,
            shutdown_deadline_secs: 60,
        }
    }
}

impl LifecycleConfig {
    pub fn timeouts(&self) -> LifecycleTimeouts {
        LifecycleTimeouts {
            start: Duration::from_secs(self.start_timeout_secs),
            stop: Duration::from_secs(self.stop_timeout_secs),
        }
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "marketd=debug").
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

impl MarketConfig {
    /// Directory holding the event journal.
    pub fn journal_dir(&self) -> PathBuf {
        self.home.join("journal")
    }
}
