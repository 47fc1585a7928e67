//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require the external endpoints the selected mode depends on
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate miners and piece stores
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MarketConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{MarketConfig, RunMode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Pool mode cannot run without an auth service.
    #[error("auth.url is required in {0} mode")]
    MissingAuthEndpoint(RunMode),

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} is not a socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("lifecycle.stop_timeout_secs ({stop}) exceeds lifecycle.shutdown_deadline_secs ({deadline})")]
    StopExceedsDeadline { stop: u64, deadline: u64 },

    #[error("api.namespace must not be empty")]
    EmptyNamespace,

    #[error("miner {0} is listed more than once")]
    DuplicateMiner(String),

    #[error("piece store '{0}' is declared more than once")]
    DuplicatePieceStore(String),

    #[error("auth token for '{0}' is empty")]
    EmptyToken(String),
}

pub fn validate_config(config: &MarketConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.mode == RunMode::Pool && config.auth.url.trim().is_empty() {
        errors.push(ValidationError::MissingAuthEndpoint(config.mode));
    }

    let endpoints = [
        ("auth.url", &config.auth.url),
        ("node.url", &config.node.url),
        ("messager.url", &config.messager.url),
        ("signer.url", &config.signer.url),
        ("gateway.url", &config.gateway.url),
    ];
    for (field, value) in endpoints {
        if !value.is_empty() && Url::parse(value).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }

    if config.api.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "api.listen",
            value: config.api.listen.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.api.namespace.trim().is_empty() {
        errors.push(ValidationError::EmptyNamespace);
    }

    let positive = [
        ("api.request_timeout_secs", config.api.request_timeout_secs),
        ("api.max_body_bytes", config.api.max_body_bytes as u64),
        ("api.max_concurrent_requests", config.api.max_concurrent_requests as u64),
        ("lifecycle.start_timeout_secs", config.lifecycle.start_timeout_secs),
        ("lifecycle.stop_timeout_secs", config.lifecycle.stop_timeout_secs),
        ("lifecycle.shutdown_deadline_secs", config.lifecycle.shutdown_deadline_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.lifecycle.stop_timeout_secs > config.lifecycle.shutdown_deadline_secs {
        errors.push(ValidationError::StopExceedsDeadline {
            stop: config.lifecycle.stop_timeout_secs,
            deadline: config.lifecycle.shutdown_deadline_secs,
        });
    }

    let mut miners = HashSet::new();
    for miner in &config.miners {
        if !miners.insert(miner.address.as_str()) {
            errors.push(ValidationError::DuplicateMiner(miner.address.clone()));
        }
    }

    let mut stores = HashSet::new();
    for store in &config.piece_storage.fs {
        if !stores.insert(store.name.as_str()) {
            errors.push(ValidationError::DuplicatePieceStore(store.name.clone()));
        }
    }

    for token in &config.auth.tokens {
        if token.token.is_empty() {
            errors.push(ValidationError::EmptyToken(token.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
