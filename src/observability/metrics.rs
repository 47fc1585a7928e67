//! Metrics collection and exposition.
//!
//! # Metrics
//! - `market_rpc_requests_total` (counter): RPC calls by method, outcome
//! - `market_rpc_request_duration_seconds` (histogram): RPC latency by method
//! - `market_permission_denied_total` (counter): denials by method
//! - `market_auth_failures_total` (counter): rejected credentials by reason
//! - `market_lifecycle_hooks_started` (gauge): hooks currently started
//! - `market_stop_failures_total` (counter): unclean stops by kind

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_rpc_request(method: &str, outcome: &'static str, started: Instant) {
    counter!("market_rpc_requests_total", "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("market_rpc_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_permission_denied(method: &str) {
    counter!("market_permission_denied_total", "method" => method.to_string()).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("market_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_hooks_started(count: usize) {
    gauge!("market_lifecycle_hooks_started").set(count as f64);
}

pub fn record_stop_failure(kind: &'static str) {
    counter!("market_stop_failures_total", "kind" => kind).increment(1);
}
