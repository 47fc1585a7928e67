//! Provider registry.
//!
//! # Responsibilities
//! - Store one provider per capability key, remembering the owning module
//! - Reject duplicate registrations unless marked as overrides
//! - Keep invokes in registration order for the injector
//!
//! # Design Decisions
//! - Passive store: no resolution happens here
//! - Overrides keep the original registration slot so build order stays stable
//! - Consumed by value by the injector, which ends the registration phase

use std::collections::HashMap;
use thiserror::Error;

use crate::composition::key::CapabilityKey;
use crate::composition::provider::{Invoke, Provider};

/// Errors raised while registering entries.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Same key registered twice without an explicit override.
    #[error("capability {key} registered by module '{module}' is already provided by module '{previous_module}'")]
    Duplicate {
        key: CapabilityKey,
        module: String,
        previous_module: String,
    },
}

/// One registration produced by a module.
#[derive(Debug)]
pub enum Entry {
    Provide(Provider),
    Override(Provider),
    Invoke(Invoke),
}

/// Ordered entries returned by a module's configure function.
#[derive(Debug, Default)]
pub struct ModuleOptions {
    entries: Vec<Entry>,
}

impl ModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(mut self, provider: Provider) -> Self {
        self.entries.push(Entry::Provide(provider));
        self
    }

    pub fn override_with(mut self, provider: Provider) -> Self {
        self.entries.push(Entry::Override(provider));
        self
    }

    pub fn invoke(mut self, invoke: Invoke) -> Self {
        self.entries.push(Entry::Invoke(invoke));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for ModuleOptions {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub(crate) struct Registered {
    pub provider: Provider,
    pub module: String,
}

pub(crate) struct RegisteredInvoke {
    pub invoke: Invoke,
    pub module: String,
}

/// Keyed store of providers plus the ordered invoke list.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<CapabilityKey, Registered>,
    order: Vec<CapabilityKey>,
    invokes: Vec<RegisteredInvoke>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; fails if the key is already provided.
    pub fn register(&mut self, module: &str, provider: Provider) -> Result<(), RegistryError> {
        let key = provider.key();
        if let Some(existing) = self.providers.get(&key) {
            return Err(RegistryError::Duplicate {
                key,
                module: module.to_string(),
                previous_module: existing.module.clone(),
            });
        }
        self.insert(module, provider);
        Ok(())
    }

    /// Register a provider, replacing any earlier one for the same key.
    pub fn override_provider(&mut self, module: &str, provider: Provider) {
        let key = provider.key();
        if let Some(previous) = self.providers.get(&key) {
            tracing::debug!(
                capability = %key,
                module = module,
                previous_module = %previous.module,
                "Overriding provider"
            );
        }
        self.insert(module, provider);
    }

    /// Append a post-build action.
    pub fn invoke(&mut self, module: &str, invoke: Invoke) {
        self.invokes.push(RegisteredInvoke {
            invoke,
            module: module.to_string(),
        });
    }

    /// Apply every entry of a module's options in order.
    pub fn apply(&mut self, module: &str, options: ModuleOptions) -> Result<(), RegistryError> {
        for entry in options {
            match entry {
                Entry::Provide(provider) => self.register(module, provider)?,
                Entry::Override(provider) => self.override_provider(module, provider),
                Entry::Invoke(invoke) => self.invoke(module, invoke),
            }
        }
        Ok(())
    }

    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.providers.contains_key(key)
    }

    /// Module that currently provides `key`.
    pub fn provided_by(&self, key: &CapabilityKey) -> Option<&str> {
        self.providers.get(key).map(|r| r.module.as_str())
    }

    /// Registered keys in first-registration order.
    pub fn keys(&self) -> &[CapabilityKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn invoke_count(&self) -> usize {
        self.invokes.len()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<CapabilityKey>,
        HashMap<CapabilityKey, Registered>,
        Vec<RegisteredInvoke>,
    ) {
        (self.order, self.providers, self.invokes)
    }

    fn insert(&mut self, module: &str, provider: Provider) {
        let key = provider.key();
        let registered = Registered {
            provider,
            module: module.to_string(),
        };
        if self.providers.insert(key, registered).is_none() {
            self.order.push(key);
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.order)
            .field("invokes", &self.invokes.len())
            .finish()
    }
}
