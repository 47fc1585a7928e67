//! Permission proxy.
//!
//! # Data Flow
//! ```text
//! call(token, operation, params)
//!     → verifier.verify(token)          ── AuthError ──→ Unauthenticated
//!     → table.required(operation)       ── None ───────→ Unguarded
//!     → identity.level >= required ?    ── no ─────────→ PermissionDenied
//!     → target.call(operation, params)  (verbatim result)
//! ```

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::observability::metrics;
use crate::permission::level::TrustLevel;
use crate::permission::table::PermissionTable;
use crate::permission::verifier::{AuthError, AuthVerifier, Identity};
use crate::rpc::surface::{CallError, RpcSurface};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Unauthenticated(#[from] AuthError),

    /// The caller's level is below the operation's requirement.
    #[error("permission denied for {operation}: requires {required}, caller has {actual}")]
    PermissionDenied {
        operation: String,
        required: TrustLevel,
        actual: TrustLevel,
    },

    /// The operation has no entry in the permission table.
    #[error("permission denied for {operation}: operation is not exposed")]
    Unguarded { operation: String, actual: TrustLevel },

    #[error(transparent)]
    Call(#[from] CallError),
}

impl ProxyError {
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            ProxyError::PermissionDenied { .. } | ProxyError::Unguarded { .. }
        )
    }
}

/// Gates every operation of `S` by caller trust level.
pub struct PermissionProxy<S: ?Sized> {
    target: Arc<S>,
    table: Arc<PermissionTable>,
    verifier: Arc<dyn AuthVerifier>,
}

impl<S: ?Sized> Clone for PermissionProxy<S> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            table: self.table.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

impl<S: RpcSurface + ?Sized> PermissionProxy<S> {
    pub fn new(target: Arc<S>, table: PermissionTable, verifier: Arc<dyn AuthVerifier>) -> Self {
        let proxy = Self {
            target,
            table: Arc::new(table),
            verifier,
        };
        let unguarded = proxy.unguarded_operations();
        if !unguarded.is_empty() {
            tracing::warn!(
                operations = ?unguarded,
                "Operations without a permission entry will be denied"
            );
        }
        proxy
    }

    /// Operations the target exposes that the table does not cover.
    pub fn unguarded_operations(&self) -> Vec<&'static str> {
        self.target
            .operations()
            .iter()
            .copied()
            .filter(|op| !self.table.contains(op))
            .collect()
    }

    /// Whether the target implements `operation` at all.
    pub fn exposes(&self, operation: &str) -> bool {
        self.target.operations().contains(&operation)
    }

    pub fn table(&self) -> &PermissionTable {
        &self.table
    }

    pub fn verifier(&self) -> &Arc<dyn AuthVerifier> {
        &self.verifier
    }

    /// Verify `token`, then run `operation` if its level allows.
    pub async fn call(&self, token: &str, operation: &str, params: Value) -> Result<Value, ProxyError> {
        let identity = self.verifier.verify(token).await?;
        self.call_as(&identity, operation, params).await
    }

    /// Run `operation` for an already verified caller.
    pub async fn call_as(
        &self,
        identity: &Identity,
        operation: &str,
        params: Value,
    ) -> Result<Value, ProxyError> {
        self.authorize(identity, operation)?;
        Ok(self.target.call(operation, params).await?)
    }

    pub fn authorize(&self, identity: &Identity, operation: &str) -> Result<(), ProxyError> {
        let Some(required) = self.table.required(operation) else {
            metrics::record_permission_denied(operation);
            return Err(ProxyError::Unguarded {
                operation: operation.to_string(),
                actual: identity.level,
            });
        };
        if !identity.level.permits(required) {
            metrics::record_permission_denied(operation);
            tracing::debug!(
                caller = %identity.name,
                operation = operation,
                required = %required,
                actual = %identity.level,
                "Permission denied"
            );
            return Err(ProxyError::PermissionDenied {
                operation: operation.to_string(),
                required,
                actual: identity.level,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StaticToken;
    use crate::permission::verifier::StaticTokenVerifier;
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call that reaches it.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RpcSurface for Recorder {
        fn operations(&self) -> &'static [&'static str] {
            &["Version", "JournalRecord", "SignDeal", "Shutdown", "Debug"]
        }

        fn call<'a>(&'a self, operation: &'a str, params: Value) -> BoxFuture<'a, Result<Value, CallError>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((operation.to_string(), params.clone()));
                Ok(json!({ "op": operation, "echo": params }))
            })
        }
    }

    fn table() -> PermissionTable {
        PermissionTable::new([
            ("Version", TrustLevel::Read),
            ("JournalRecord", TrustLevel::Write),
            ("SignDeal", TrustLevel::Sign),
            ("Shutdown", TrustLevel::Admin),
        ])
    }

    fn verifier() -> Arc<dyn AuthVerifier> {
        let tokens: Vec<StaticToken> = TrustLevel::ALL
            .iter()
            .map(|level| StaticToken {
                token: level.as_str().to_string(),
                name: format!("{level}-caller"),
                level: *level,
            })
            .collect();
        Arc::new(StaticTokenVerifier::new(&tokens))
    }

    #[tokio::test]
    async fn test_invokes_iff_level_suffices() {
        let target = Arc::new(Recorder::default());
        let proxy = PermissionProxy::new(target.clone(), table(), verifier());

        let mut expected_calls = 0;
        for caller in TrustLevel::ALL {
            for (operation, required) in table().operations().map(|(op, l)| (op.to_string(), l)).collect::<Vec<_>>() {
                let before = target.calls.lock().unwrap().len();
                let result = proxy.call(caller.as_str(), &operation, json!([1])).await;
                let after = target.calls.lock().unwrap().len();

                if caller >= required {
                    expected_calls += 1;
                    assert_eq!(result.unwrap(), json!({ "op": operation, "echo": [1] }));
                    assert_eq!(after, before + 1);
                } else {
                    match result {
                        Err(ProxyError::PermissionDenied { required: r, actual, .. }) => {
                            assert_eq!(r, required);
                            assert_eq!(actual, caller);
                        }
                        other => panic!("expected denial, got {other:?}"),
                    }
                    assert_eq!(after, before);
                }
            }
        }
        assert_eq!(target.calls.lock().unwrap().len(), expected_calls);
    }

    #[test]
    fn test_exposes_follows_target_operations() {
        let proxy = PermissionProxy::new(Arc::new(Recorder::default()), table(), verifier());
        assert!(proxy.exposes("Debug"));
        assert!(proxy.exposes("Version"));
        assert!(!proxy.exposes("DealsImport"));
    }

    #[tokio::test]
    async fn test_unguarded_operation_denied_for_admin() {
        let target = Arc::new(Recorder::default());
        let proxy = PermissionProxy::new(target.clone(), table(), verifier());
        assert_eq!(proxy.unguarded_operations(), vec!["Debug"]);

        let err = proxy.call("admin", "Debug", Value::Null).await.unwrap_err();
        assert!(matches!(err, ProxyError::Unguarded { .. }));
        assert!(err.is_denial());
        assert!(target.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_token_never_reaches_target() {
        let target = Arc::new(Recorder::default());
        let proxy = PermissionProxy::new(target.clone(), table(), verifier());

        let err = proxy.call("forged", "Version", Value::Null).await.unwrap_err();
        assert!(matches!(err, ProxyError::Unauthenticated(AuthError::Invalid)));
        assert!(!err.is_denial());
        assert!(target.calls.lock().unwrap().is_empty());
    }
}
