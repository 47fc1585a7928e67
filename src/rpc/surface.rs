//! The remotely invokable capability surface.
//!
//! An [`RpcSurface`] exposes a fixed set of named operations taking and
//! returning JSON values. The permission proxy wraps one; the router
//! dispatches to the proxy.

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors an operation reports to its caller.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The operation ran and failed.
    #[error("{0}")]
    Failed(String),
}

pub trait RpcSurface: Send + Sync + 'static {
    /// Every operation `call` accepts.
    fn operations(&self) -> &'static [&'static str];

    fn call<'a>(&'a self, operation: &'a str, params: Value) -> BoxFuture<'a, Result<Value, CallError>>;
}

/// Decode positional or named params.
///
/// A single-element array is unwrapped so `[x]` and `x` decode alike; an
/// absent or empty param list decodes from `null`.
pub fn decode_params<T: DeserializeOwned>(params: Value) -> Result<T, CallError> {
    let value = match params {
        Value::Array(mut items) if items.len() <= 1 => items.pop().unwrap_or(Value::Null),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| CallError::InvalidParams(e.to_string()))
}

pub fn encode_result<T: Serialize>(value: T) -> Result<Value, CallError> {
    serde_json::to_value(value).map_err(|e| CallError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        system: String,
    }

    #[test]
    fn test_decode_positional_and_named() {
        let positional: Record = decode_params(json!([{ "system": "deals" }])).unwrap();
        let named: Record = decode_params(json!({ "system": "deals" })).unwrap();
        assert_eq!(positional, named);
    }

    #[test]
    fn test_decode_empty_params() {
        let unit: () = decode_params(json!([])).unwrap();
        assert_eq!(unit, ());
        let unit: () = decode_params(Value::Null).unwrap();
        assert_eq!(unit, ());
    }

    #[test]
    fn test_decode_mismatch() {
        let err = decode_params::<Record>(json!([1, 2])).unwrap_err();
        assert!(matches!(err, CallError::InvalidParams(_)));
    }
}
