//! Caller credential verification.
//!
//! # Responsibilities
//! - Resolve a bearer token to an [`Identity`] carrying a trust level
//! - Answer from locally configured tokens without network I/O
//! - Ask the remote auth service otherwise, caching positive answers
//!
//! # Design Decisions
//! - Only successful verifications are cached; a revoked token stops
//!   working at most `cache_ttl` after revocation
//! - Transport failures are reported separately from rejected tokens so the
//!   router can tell a bad caller from an unavailable auth service

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use crate::config::schema::StaticToken;
use crate::permission::level::TrustLevel;

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(rename = "perm")]
    pub level: TrustLevel,
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing bearer token")]
    Missing,

    /// The credential is unknown or revoked.
    #[error("invalid bearer token")]
    Invalid,

    /// The auth service could not be reached or answered garbage.
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Invalid => "invalid",
            AuthError::Unavailable(_) => "unavailable",
        }
    }
}

/// Resolves a presented token to a caller identity.
pub trait AuthVerifier: Send + Sync {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Identity, AuthError>>;
}

/// Tokens configured in `auth.tokens`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: &[StaticToken]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|t| {
                    (
                        t.token.clone(),
                        Identity {
                            name: t.name.clone(),
                            level: t.level,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn lookup(&self, token: &str) -> Option<&Identity> {
        self.tokens.get(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AuthVerifier for StaticTokenVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Identity, AuthError>> {
        Box::pin(async move {
            if token.is_empty() {
                return Err(AuthError::Missing);
            }
            self.lookup(token).cloned().ok_or(AuthError::Invalid)
        })
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

/// Client for the external auth service (`POST {url}/verify`).
pub struct RemoteAuthVerifier {
    client: reqwest::Client,
    endpoint: Url,
    service_token: String,
    local: StaticTokenVerifier,
    cache: Arc<DashMap<String, (Identity, Instant)>>,
    cache_ttl: Duration,
}

impl RemoteAuthVerifier {
    pub fn new(base: &str, service_token: impl Into<String>, cache_ttl: Duration) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(&format!("{}/verify", base.trim_end_matches('/')))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            service_token: service_token.into(),
            local: StaticTokenVerifier::default(),
            cache: Arc::new(DashMap::new()),
            cache_ttl,
        })
    }

    /// Tokens answered locally before the remote service is asked.
    pub fn with_local_tokens(mut self, local: StaticTokenVerifier) -> Self {
        self.local = local;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn cache_get(&self, token: &str) -> Option<Identity> {
        let hit = self.cache.get(token).map(|entry| entry.value().clone())?;
        let (identity, verified_at) = hit;
        if verified_at.elapsed() < self.cache_ttl {
            return Some(identity);
        }
        self.cache.remove(token);
        None
    }

    /// Cache a verified identity, dropping every expired entry first.
    fn cache_insert(&self, token: &str, identity: Identity) {
        let ttl = self.cache_ttl;
        self.cache.retain(|_, (_, verified_at)| verified_at.elapsed() < ttl);
        self.cache.insert(token.to_string(), (identity, Instant::now()));
    }

    async fn fetch(&self, token: &str) -> Result<Identity, AuthError> {
        let mut request = self.client.post(self.endpoint.clone()).json(&VerifyRequest { token });
        if !self.service_token.is_empty() {
            request = request.bearer_auth(&self.service_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(AuthError::Invalid);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("auth service returned {status}")));
        }

        response
            .json::<Identity>()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))
    }
}

impl AuthVerifier for RemoteAuthVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Identity, AuthError>> {
        Box::pin(async move {
            if token.is_empty() {
                return Err(AuthError::Missing);
            }
            if let Some(identity) = self.local.lookup(token) {
                return Ok(identity.clone());
            }
            if let Some(identity) = self.cache_get(token) {
                return Ok(identity);
            }

            match self.fetch(token).await {
                Ok(identity) => {
                    tracing::debug!(name = %identity.name, level = %identity.level, "Token verified");
                    self.cache_insert(token, identity.clone());
                    Ok(identity)
                }
                Err(e) => {
                    if let AuthError::Unavailable(reason) = &e {
                        tracing::warn!(endpoint = %self.endpoint, reason = %reason, "Auth service request failed");
                    }
                    Err(e)
                }
            }
        })
    }
}
