//! Bearer-token authentication for every route.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::observability::metrics;
use crate::permission::{AuthError, AuthVerifier, Identity};

/// The authenticated caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub identity: Identity,
}

pub fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Reject requests without a valid bearer token before any handler runs.
pub async fn require_bearer(
    State(verifier): State<Arc<dyn AuthVerifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(&request).unwrap_or_default().to_string();

    match verifier.verify(&token).await {
        Ok(identity) => {
            request.extensions_mut().insert(Caller { token, identity });
            next.run(request).await
        }
        Err(AuthError::Unavailable(reason)) => {
            metrics::record_auth_failure("unavailable");
            tracing::warn!(reason = %reason, path = %request.uri().path(), "Cannot verify caller");
            (StatusCode::SERVICE_UNAVAILABLE, "auth service unavailable").into_response()
        }
        Err(e) => {
            metrics::record_auth_failure(e.reason());
            tracing::debug!(error = %e, path = %request.uri().path(), "Unauthenticated request");
            (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
        }
    }
}
