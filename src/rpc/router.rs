//! RPC router.
//!
//! # Responsibilities
//! - Hold named routes; refuse a second mount on the same path
//! - Mount the JSON-RPC endpoint backed by the permission proxy
//! - Authenticate every request before any handler runs
//! - Serve until the finish signal closes, then drain within a grace window
//!
//! # Middleware (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → ConcurrencyLimit
//!     → Timeout → BodyLimit → require_bearer → handler
//! ```

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Extension, State},
    http::{HeaderValue, Request},
    middleware,
    response::IntoResponse,
    routing::{post, MethodRouter},
    Json, Router,
};
use std::collections::BTreeMap;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::schema::ApiConfig;
use crate::lifecycle::FinishSignal;
use crate::observability::metrics;
use crate::permission::{AuthVerifier, PermissionProxy};
use crate::rpc::auth::{require_bearer, Caller};
use crate::rpc::jsonrpc::{self, ErrorObject, METHOD_NOT_FOUND};
use crate::rpc::surface::RpcSurface;

/// Path of the JSON-RPC endpoint.
pub const RPC_PATH: &str = "/rpc/v0";

#[derive(Debug, Error)]
pub enum RpcError {
    /// A path was mounted twice.
    #[error("route '{0}' is already mounted")]
    RouteConflict(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serving limits.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_concurrent_requests: usize,
    pub shutdown_grace: Duration,
}

impl From<&ApiConfig> for ServeOptions {
    fn from(api: &ApiConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(api.request_timeout_secs),
            max_body_bytes: api.max_body_bytes,
            max_concurrent_requests: api.max_concurrent_requests,
            shutdown_grace: Duration::from_secs(api.shutdown_grace_secs),
        }
    }
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

#[derive(Clone, Copy, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

struct RpcState<S: ?Sized> {
    namespace: String,
    proxy: PermissionProxy<S>,
}

pub struct RpcRouter {
    routes: BTreeMap<String, MethodRouter>,
    options: ServeOptions,
}

impl RpcRouter {
    pub fn new(options: ServeOptions) -> Self {
        Self {
            routes: BTreeMap::new(),
            options,
        }
    }

    /// Bind `route` to `path`. Fails if `path` is taken; the existing route stays.
    pub fn mount(&mut self, path: impl Into<String>, route: MethodRouter) -> Result<(), RpcError> {
        let path = path.into();
        if self.routes.contains_key(&path) {
            return Err(RpcError::RouteConflict(path));
        }
        tracing::debug!(path = %path, "Route mounted");
        self.routes.insert(path, route);
        Ok(())
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Mount the JSON-RPC endpoint and build the service with every layer applied.
    pub fn into_service<S: RpcSurface + ?Sized>(
        mut self,
        namespace: &str,
        verifier: Arc<dyn AuthVerifier>,
        proxy: PermissionProxy<S>,
    ) -> Result<Router, RpcError> {
        let state = Arc::new(RpcState {
            namespace: namespace.to_string(),
            proxy,
        });
        self.mount(RPC_PATH, post(handle_rpc::<S>).with_state(state))?;

        let mut app = Router::new();
        for (path, route) in self.routes {
            app = app.route(&path, route);
        }

        #[allow(deprecated)]
        let timeout = TimeoutLayer::new(self.options.request_timeout);

        Ok(app
            .layer(middleware::from_fn_with_state(verifier, require_bearer))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.options.max_body_bytes))
            .layer(timeout)
            .layer(GlobalConcurrencyLimitLayer::new(self.options.max_concurrent_requests))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
    }

    /// Serve on `listener` until `finish` closes.
    ///
    /// After `finish` no new connections are accepted; in-flight requests get
    /// `shutdown_grace` to complete before they are abandoned.
    pub async fn serve<S: RpcSurface + ?Sized>(
        self,
        listener: TcpListener,
        namespace: &str,
        verifier: Arc<dyn AuthVerifier>,
        proxy: PermissionProxy<S>,
        finish: FinishSignal,
    ) -> Result<(), RpcError> {
        let grace = self.options.shutdown_grace;
        let app = self.into_service(namespace, verifier, proxy)?;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, namespace = namespace, "RPC server listening");

        let drained = finish.clone();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                drained.wait().await;
                tracing::info!("Finish signal received, draining RPC server");
            })
            .into_future();

        let grace_window = async {
            finish.wait().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = server => {
                result?;
                tracing::info!("RPC server stopped");
            }
            _ = grace_window => {
                tracing::warn!(grace = ?grace, "Shutdown grace elapsed, abandoning in-flight requests");
            }
        }
        Ok(())
    }
}

async fn handle_rpc<S: RpcSurface + ?Sized>(
    State(state): State<Arc<RpcState<S>>>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> impl IntoResponse {
    let started = Instant::now();
    let request = match jsonrpc::parse_request(&body) {
        Ok(request) => request,
        Err(response) => return Json(response),
    };

    let operation = match jsonrpc::operation(&state.namespace, &request.method) {
        Some(operation) if state.proxy.exposes(operation) => operation,
        _ => {
            metrics::record_rpc_request(&request.method, "not_found", started);
            let error = ErrorObject::new(METHOD_NOT_FOUND, format!("method '{}' not found", request.method));
            return Json(jsonrpc::Response::failure(request.id, error));
        }
    };

    // The middleware already resolved the caller's identity.
    let result = state
        .proxy
        .call_as(&caller.identity, operation, request.params)
        .await;

    let response = match result {
        Ok(value) => {
            metrics::record_rpc_request(operation, "ok", started);
            jsonrpc::Response::success(request.id, value)
        }
        Err(e) => {
            let outcome = if e.is_denial() { "denied" } else { "error" };
            metrics::record_rpc_request(operation, outcome, started);
            if !e.is_denial() {
                tracing::debug!(caller = %caller.identity.name, operation = operation, error = %e, "RPC call failed");
            }
            jsonrpc::Response::failure(request.id, ErrorObject::from(&e))
        }
    };
    Json(response)
}
