//! The aggregate market API exposed over RPC.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::schema::{MarketConfig, MinerConfig};
use crate::lifecycle::{ShutdownReason, ShutdownSignal};
use crate::node::journal::FsJournal;
use crate::node::piece_store::{FsPieceStore, StoreInfo};
use crate::permission::{PermissionTable, TrustLevel};
use crate::rpc::surface::{decode_params, encode_result, CallError, RpcSurface};

pub const API_VERSION: &str = "1.0.0";

const OPERATIONS: &[(&str, TrustLevel)] = &[
    ("Version", TrustLevel::Read),
    ("ActorList", TrustLevel::Read),
    ("PaymentAddress", TrustLevel::Read),
    ("PieceStorageInfo", TrustLevel::Read),
    ("JournalRecord", TrustLevel::Write),
    ("Shutdown", TrustLevel::Admin),
];

const OPERATION_NAMES: [&str; OPERATIONS.len()] = {
    let mut names = [""; OPERATIONS.len()];
    let mut i = 0;
    while i < OPERATIONS.len() {
        names[i] = OPERATIONS[i].0;
        i += 1;
    }
    names
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalRecordParams {
    pub system: String,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Every operation remote callers can reach, built from the object graph.
pub struct MarketNode {
    miners: Vec<MinerConfig>,
    payment_address: String,
    journal: Arc<FsJournal>,
    pieces: Arc<FsPieceStore>,
    shutdown: ShutdownSignal,
}

impl MarketNode {
    pub fn new(
        config: &MarketConfig,
        journal: Arc<FsJournal>,
        pieces: Arc<FsPieceStore>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            miners: config.miners.clone(),
            payment_address: config.payment.address.clone(),
            journal,
            pieces,
            shutdown,
        }
    }

    /// Required trust level per operation.
    pub fn permission_table() -> PermissionTable {
        PermissionTable::new(OPERATIONS.iter().copied())
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: API_VERSION.to_string(),
        }
    }

    pub fn actor_list(&self) -> &[MinerConfig] {
        &self.miners
    }

    pub fn payment_address(&self) -> &str {
        &self.payment_address
    }

    pub fn piece_storage_info(&self) -> Vec<StoreInfo> {
        self.pieces.info()
    }

    pub async fn journal_record(&self, params: JournalRecordParams) -> Result<bool, CallError> {
        self.journal
            .record(&params.system, &params.event, params.data)
            .await
            .map_err(|e| CallError::Failed(e.to_string()))
    }

    /// Returns whether this call was the one that requested shutdown.
    pub fn shutdown(&self) -> bool {
        self.shutdown.trigger(ShutdownReason::Rpc)
    }
}

impl RpcSurface for MarketNode {
    fn operations(&self) -> &'static [&'static str] {
        &OPERATION_NAMES
    }

    fn call<'a>(&'a self, operation: &'a str, params: Value) -> BoxFuture<'a, Result<Value, CallError>> {
        Box::pin(async move {
            match operation {
                "Version" => encode_result(self.version()),
                "ActorList" => encode_result(self.actor_list()),
                "PaymentAddress" => encode_result(self.payment_address()),
                "PieceStorageInfo" => encode_result(self.piece_storage_info()),
                "JournalRecord" => {
                    let params: JournalRecordParams = decode_params(params)?;
                    encode_result(self.journal_record(params).await?)
                }
                "Shutdown" => encode_result(self.shutdown()),
                other => Err(CallError::UnknownOperation(other.to_string())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(shutdown: ShutdownSignal) -> MarketNode {
        let mut config = MarketConfig::default();
        config.payment.address = "f1payment".to_string();
        config.miners = vec![MinerConfig { address: "f01000".to_string(), account: "ops".to_string() }];
        let journal = Arc::new(FsJournal::new(
            std::env::temp_dir().join("marketd-api-unopened"),
            &config.journal,
        ));
        MarketNode::new(&config, journal, Arc::new(FsPieceStore::new(Vec::new())), shutdown)
    }

    #[test]
    fn test_table_covers_every_operation() {
        let table = MarketNode::permission_table();
        for op in OPERATION_NAMES {
            assert!(table.contains(op), "{op} has no permission entry");
        }
        assert_eq!(table.len(), OPERATION_NAMES.len());
        assert_eq!(table.required("Shutdown"), Some(TrustLevel::Admin));
        assert_eq!(table.required("JournalRecord"), Some(TrustLevel::Write));
    }

    #[test]
    fn test_every_exposed_operation_is_guarded() {
        let node = node(ShutdownSignal::new());
        let table = MarketNode::permission_table();
        let mut exposed: Vec<&str> = node.operations().to_vec();
        let mut guarded: Vec<&str> = table.operations().map(|(op, _)| op).collect();
        exposed.sort_unstable();
        guarded.sort_unstable();
        assert_eq!(exposed, guarded);
    }

    #[tokio::test]
    async fn test_read_operations() {
        let node = node(ShutdownSignal::new());
        assert_eq!(node.call("PaymentAddress", Value::Null).await.unwrap(), json!("f1payment"));
        assert_eq!(
            node.call("ActorList", json!([])).await.unwrap(),
            json!([{ "address": "f01000", "account": "ops" }])
        );
        let version: VersionInfo = serde_json::from_value(node.call("Version", Value::Null).await.unwrap()).unwrap();
        assert_eq!(version.api_version, API_VERSION);
    }

    #[tokio::test]
    async fn test_shutdown_triggers_signal_once() {
        let shutdown = ShutdownSignal::new();
        let node = node(shutdown.clone());
        assert_eq!(node.call("Shutdown", Value::Null).await.unwrap(), json!(true));
        assert_eq!(node.call("Shutdown", Value::Null).await.unwrap(), json!(false));
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Rpc));
    }

    #[tokio::test]
    async fn test_unknown_operation_and_bad_params() {
        let node = node(ShutdownSignal::new());
        assert!(matches!(
            node.call("DealsImport", Value::Null).await,
            Err(CallError::UnknownOperation(_))
        ));
        assert!(matches!(
            node.call("JournalRecord", json!([1])).await,
            Err(CallError::InvalidParams(_))
        ));
    }
}
