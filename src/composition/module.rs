//! Module registration surface.
//!
//! Each subsystem exposes a [`Module`] whose `configure` turns the immutable
//! process configuration into registry entries.

use thiserror::Error;

use crate::composition::registry::{ModuleOptions, ProviderRegistry, RegistryError};
use crate::composition::BoxError;

/// A subsystem that contributes providers, overrides and invokes.
pub trait Module<C>: Send + Sync {
    /// Stable name used in error messages and logs.
    fn name(&self) -> &'static str;

    fn configure(&self, config: &C) -> Result<ModuleOptions, BoxError>;
}

/// Errors raised while collecting module options.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A module's configure function failed.
    #[error("module '{module}' failed to configure: {source}")]
    Module {
        module: &'static str,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Apply every module, in order, to a fresh registry.
pub fn compose<C>(config: &C, modules: &[&dyn Module<C>]) -> Result<ProviderRegistry, ComposeError> {
    let mut registry = ProviderRegistry::new();
    for module in modules {
        let options = module
            .configure(config)
            .map_err(|source| ComposeError::Module {
                module: module.name(),
                source,
            })?;
        tracing::debug!(module = module.name(), entries = options.len(), "Module configured");
        registry.apply(module.name(), options)?;
    }
    Ok(registry)
}
