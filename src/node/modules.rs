//! Modules composing the pool-mode daemon.
//!
//! Registered in this order (any order resolves; this one reads best):
//! ```text
//! core          Arc<MarketConfig>, ShutdownSignal
//! journal       Arc<FsJournal>            ← config         (open / flush)
//! auth          Arc<dyn AuthVerifier>     ← config
//! piece-storage Arc<FsPieceStore>         ← config         (ensure dirs)
//! market-api    Arc<MarketNode>           ← config, journal, pieces, shutdown
//!               invoke(10): populate Slot<Arc<MarketNode>>
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::composition::{BoxError, CapabilityKey, Invoke, Module, ModuleOptions, Provider, Slot};
use crate::config::schema::{MarketConfig, RunMode};
use crate::config::validation::ValidationError;
use crate::lifecycle::{Hook, ShutdownSignal};
use crate::node::api::MarketNode;
use crate::node::journal::FsJournal;
use crate::node::piece_store::FsPieceStore;
use crate::permission::{AuthVerifier, RemoteAuthVerifier, StaticTokenVerifier};

/// Priority of the invoke extracting the market API from the graph.
pub const EXTRACT_API_PRIORITY: i32 = 10;

fn config_key() -> CapabilityKey {
    CapabilityKey::of::<Arc<MarketConfig>>()
}

/// Process-wide values every other module builds on.
pub struct CoreModule {
    shutdown: ShutdownSignal,
}

impl CoreModule {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }
}

impl Module<MarketConfig> for CoreModule {
    fn name(&self) -> &'static str {
        "core"
    }

    fn configure(&self, config: &MarketConfig) -> Result<ModuleOptions, BoxError> {
        Ok(ModuleOptions::new()
            .provide(Provider::value(Arc::new(config.clone())))
            .provide(Provider::value(self.shutdown.clone())))
    }
}

pub struct JournalModule;

impl Module<MarketConfig> for JournalModule {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn configure(&self, _config: &MarketConfig) -> Result<ModuleOptions, BoxError> {
        Ok(ModuleOptions::new().provide(Provider::from_fn(&[config_key()], |ctx| {
            let config = ctx.get::<Arc<MarketConfig>>()?;
            let journal = Arc::new(FsJournal::new(config.journal_dir(), &config.journal));

            let start = journal.clone();
            let stop = journal.clone();
            ctx.on_lifecycle(
                Hook::new()
                    .on_start(move || async move { start.open().await.map_err(BoxError::from) })
                    .on_stop(move || async move { stop.close().await.map_err(BoxError::from) }),
            );
            Ok(journal)
        })))
    }
}

pub struct AuthModule;

impl Module<MarketConfig> for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn configure(&self, config: &MarketConfig) -> Result<ModuleOptions, BoxError> {
        if config.mode == RunMode::Pool && config.auth.url.trim().is_empty() {
            return Err(Box::new(ValidationError::MissingAuthEndpoint(config.mode)));
        }

        Ok(ModuleOptions::new().provide(Provider::from_fn(&[config_key()], |ctx| {
            let config = ctx.get::<Arc<MarketConfig>>()?;
            let local = StaticTokenVerifier::new(&config.auth.tokens);
            if config.auth.url.is_empty() {
                tracing::info!(tokens = local.len(), "Using local auth tokens only");
                let verifier: Arc<dyn AuthVerifier> = Arc::new(local);
                return Ok(verifier);
            }

            let remote = RemoteAuthVerifier::new(
                &config.auth.url,
                config.auth.token.clone(),
                Duration::from_secs(config.auth.cache_ttl_secs),
            )?
            .with_local_tokens(local);
            tracing::info!(endpoint = %remote.endpoint(), "Using remote auth service");
            let verifier: Arc<dyn AuthVerifier> = Arc::new(remote);
            Ok(verifier)
        })))
    }
}

pub struct PieceStorageModule;

impl Module<MarketConfig> for PieceStorageModule {
    fn name(&self) -> &'static str {
        "piece-storage"
    }

    fn configure(&self, _config: &MarketConfig) -> Result<ModuleOptions, BoxError> {
        Ok(ModuleOptions::new().provide(Provider::from_fn(&[config_key()], |ctx| {
            let config = ctx.get::<Arc<MarketConfig>>()?;
            let store = Arc::new(FsPieceStore::new(config.piece_storage.fs.clone()));

            let start = store.clone();
            ctx.on_lifecycle(
                Hook::new().on_start(move || async move { start.ensure_dirs().await.map_err(BoxError::from) }),
            );
            Ok(store)
        })))
    }
}

/// Builds the aggregate API and extracts it for the RPC layer.
pub struct MarketApiModule {
    slot: Slot<Arc<MarketNode>>,
}

impl MarketApiModule {
    pub fn new() -> Self {
        Self { slot: Slot::new() }
    }

    /// Filled once the graph is built.
    pub fn slot(&self) -> Slot<Arc<MarketNode>> {
        self.slot.clone()
    }
}

impl Default for MarketApiModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module<MarketConfig> for MarketApiModule {
    fn name(&self) -> &'static str {
        "market-api"
    }

    fn configure(&self, _config: &MarketConfig) -> Result<ModuleOptions, BoxError> {
        let deps = [
            config_key(),
            CapabilityKey::of::<Arc<FsJournal>>(),
            CapabilityKey::of::<Arc<FsPieceStore>>(),
            CapabilityKey::of::<ShutdownSignal>(),
        ];
        Ok(ModuleOptions::new()
            .provide(Provider::from_fn(&deps, |ctx| {
                let config = ctx.get::<Arc<MarketConfig>>()?;
                Ok(Arc::new(MarketNode::new(
                    &config,
                    ctx.get::<Arc<FsJournal>>()?,
                    ctx.get::<Arc<FsPieceStore>>()?,
                    ctx.get::<ShutdownSignal>()?,
                )))
            }))
            .invoke(Invoke::populate(EXTRACT_API_PRIORITY, &self.slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{compose, ComposeError, Injector};

    fn solo_config() -> MarketConfig {
        let mut config = MarketConfig::default();
        config.mode = RunMode::Solo;
        config.home = std::env::temp_dir().join(format!("marketd-modules-{}", uuid::Uuid::new_v4()));
        config
    }

    #[test]
    fn test_pool_mode_without_auth_url_fails_in_auth_module() {
        let config = MarketConfig::default();
        let err = compose(&config, &[&CoreModule::new(ShutdownSignal::new()), &AuthModule]).unwrap_err();
        match err {
            ComposeError::Module { module, .. } => assert_eq!(module, "auth"),
            other => panic!("expected module error, got {other:?}"),
        }
    }

    #[test]
    fn test_modules_resolve_in_any_order() {
        let config = solo_config();
        let api = MarketApiModule::new();
        let core = CoreModule::new(ShutdownSignal::new());
        let registry = compose(
            &config,
            &[&api, &PieceStorageModule, &AuthModule, &JournalModule, &core],
        )
        .unwrap();

        let assembly = Injector::build(registry).unwrap();
        let order = assembly.build_order();
        let position = |key: CapabilityKey| order.iter().position(|k| *k == key).unwrap();
        assert!(position(config_key()) < position(CapabilityKey::of::<Arc<FsJournal>>()));
        assert!(position(CapabilityKey::of::<Arc<FsJournal>>()) < position(CapabilityKey::of::<Arc<MarketNode>>()));

        assert!(api.slot().is_filled());
        assert_eq!(
            assembly.hooked(),
            vec![CapabilityKey::of::<Arc<FsJournal>>(), CapabilityKey::of::<Arc<FsPieceStore>>()]
        );
    }
}
