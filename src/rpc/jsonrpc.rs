//! JSON-RPC 2.0 envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::permission::ProxyError;
use crate::rpc::surface::CallError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Caller authenticated but its trust level is too low.
pub const PERMISSION_DENIED: i64 = -32001;
/// Credential rejected between authentication and dispatch.
pub const UNAUTHENTICATED: i64 = -32002;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&CallError> for ErrorObject {
    fn from(err: &CallError) -> Self {
        let code = match err {
            CallError::UnknownOperation(_) => METHOD_NOT_FOUND,
            CallError::InvalidParams(_) => INVALID_PARAMS,
            CallError::Failed(_) => INTERNAL_ERROR,
        };
        ErrorObject::new(code, err.to_string())
    }
}

impl From<&ProxyError> for ErrorObject {
    fn from(err: &ProxyError) -> Self {
        match err {
            ProxyError::PermissionDenied { required, actual, .. } => {
                ErrorObject::new(PERMISSION_DENIED, err.to_string())
                    .with_data(json!({ "required": required, "actual": actual }))
            }
            ProxyError::Unguarded { actual, .. } => ErrorObject::new(PERMISSION_DENIED, err.to_string())
                .with_data(json!({ "required": Value::Null, "actual": actual })),
            ProxyError::Unauthenticated(_) => ErrorObject::new(UNAUTHENTICATED, err.to_string()),
            ProxyError::Call(call) => call.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    pub id: Value,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: ErrorObject) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Parse a request body, producing the error response to send on failure.
pub fn parse_request(body: &[u8]) -> Result<Request, Response> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Response::failure(Value::Null, ErrorObject::new(PARSE_ERROR, e.to_string())))?;

    if value.is_array() {
        return Err(Response::failure(
            Value::Null,
            ErrorObject::new(INVALID_REQUEST, "batch requests are not supported"),
        ));
    }

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: Request = serde_json::from_value(value)
        .map_err(|e| Response::failure(id.clone(), ErrorObject::new(INVALID_REQUEST, e.to_string())))?;

    if request.jsonrpc != "2.0" {
        return Err(Response::failure(
            id,
            ErrorObject::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        ));
    }
    Ok(request)
}

/// Strip `namespace.` from a method name.
pub fn operation<'m>(namespace: &str, method: &'m str) -> Option<&'m str> {
    method
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|op| !op.is_empty())
}
