//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use marketd::config::{MarketConfig, RunMode, StaticToken};
use marketd::lifecycle::ShutdownSignal;
use marketd::permission::TrustLevel;
use marketd::{DaemonError, PoolDaemon};

/// A fresh directory under the system temp dir.
pub fn temp_home(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("marketd-{name}-{}", uuid::Uuid::new_v4()))
}

/// One static token per trust level, named after the level.
pub fn level_tokens() -> Vec<StaticToken> {
    TrustLevel::ALL
        .iter()
        .map(|level| StaticToken {
            token: format!("{level}-token"),
            name: format!("{level}-caller"),
            level: *level,
        })
        .collect()
}

/// Solo-mode config with static tokens, listening on an ephemeral port.
pub fn solo_config(home: PathBuf) -> MarketConfig {
    let mut config = MarketConfig::default();
    config.mode = RunMode::Solo;
    config.api.listen = "127.0.0.1:0".to_string();
    config.api.shutdown_grace_secs = 1;
    config.auth.tokens = level_tokens();
    config.lifecycle.stop_timeout_secs = 2;
    config.lifecycle.shutdown_deadline_secs = 5;
    config.home = home;
    config
}

pub struct RunningDaemon {
    pub addr: SocketAddr,
    pub shutdown: ShutdownSignal,
    pub task: JoinHandle<Result<(), DaemonError>>,
}

impl RunningDaemon {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait for the daemon task to return.
    pub async fn join(self) -> Result<(), DaemonError> {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("daemon stopped in time")
            .expect("daemon task panicked")
    }
}

/// Assemble and serve a daemon on an ephemeral port.
pub async fn start_daemon(config: MarketConfig) -> RunningDaemon {
    let listener = TcpListener::bind(&config.api.listen).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let daemon = PoolDaemon::assemble(config, shutdown.clone()).unwrap();
    let task = tokio::spawn(daemon.serve(listener));
    tokio::time::sleep(Duration::from_millis(50)).await;
    RunningDaemon { addr, shutdown, task }
}

/// POST a JSON-RPC request and return HTTP status plus decoded body.
pub async fn rpc_call(
    client: &reqwest::Client,
    daemon: &RunningDaemon,
    token: Option<&str>,
    method: &str,
    params: Value,
) -> (StatusCode, Value) {
    let mut request = client.post(daemon.url("/rpc/v0")).json(&json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    }));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Mock auth service: `tokens` maps token → (name, perm).
pub async fn start_mock_auth(tokens: Vec<(&'static str, &'static str, &'static str)>) -> String {
    let app = Router::new().route(
        "/verify",
        post(move |Json(body): Json<Value>| {
            let tokens = tokens.clone();
            async move {
                let token = body["token"].as_str().unwrap_or_default();
                tokens
                    .iter()
                    .find(|(t, _, _)| *t == token)
                    .map(|(_, name, perm)| Json(json!({ "name": name, "perm": perm })))
                    .ok_or(StatusCode::UNAUTHORIZED)
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
