//! Provider and invoke entries.
//!
//! # Responsibilities
//! - Wrap fixed values and constructors behind a uniform entry type
//! - Carry the explicit dependency list of each constructor
//! - Give constructors and invokes scoped access to the graph

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::composition::graph::{GraphError, Instance, ObjectGraph};
use crate::composition::key::CapabilityKey;
use crate::composition::BoxError;
use crate::lifecycle::Hook;

pub(crate) type Constructor =
    Box<dyn FnOnce(&mut ProviderContext<'_>) -> Result<Instance, BoxError> + Send>;

type InvokeFn = Box<dyn FnOnce(&mut InvokeContext<'_>) -> Result<(), BoxError> + Send>;

pub(crate) enum Source {
    Value(Instance),
    Constructor(Constructor),
}

/// A registered supplier of one capability.
pub struct Provider {
    key: CapabilityKey,
    deps: Vec<CapabilityKey>,
    source: Source,
}

impl Provider {
    /// Supply a fixed, already-built value.
    pub fn value<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self {
            key: CapabilityKey::of::<T>(),
            deps: Vec::new(),
            source: Source::Value(Arc::new(value)),
        }
    }

    /// Supply `T` by running `f` once all of `deps` are built.
    ///
    /// The constructor only sees the keys listed in `deps`.
    pub fn from_fn<T, F>(deps: &[CapabilityKey], f: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&mut ProviderContext<'_>) -> Result<T, BoxError> + Send + 'static,
    {
        let constructor: Constructor =
            Box::new(move |ctx| f(ctx).map(|value| Arc::new(value) as Instance));
        Self {
            key: CapabilityKey::of::<T>(),
            deps: deps.to_vec(),
            source: Source::Constructor(constructor),
        }
    }

    pub fn key(&self) -> CapabilityKey {
        self.key
    }

    pub fn deps(&self) -> &[CapabilityKey] {
        &self.deps
    }

    /// True for fixed values, false for constructors.
    pub fn is_value(&self) -> bool {
        matches!(self.source, Source::Value(_))
    }

    pub(crate) fn into_source(self) -> Source {
        self.source
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("deps", &self.deps)
            .field("value", &self.is_value())
            .finish()
    }
}

/// View of the partially built graph handed to a constructor.
pub struct ProviderContext<'a> {
    key: CapabilityKey,
    deps: &'a [CapabilityKey],
    graph: &'a ObjectGraph,
    hooks: Vec<Hook>,
}

impl<'a> ProviderContext<'a> {
    pub(crate) fn new(key: CapabilityKey, deps: &'a [CapabilityKey], graph: &'a ObjectGraph) -> Self {
        Self {
            key,
            deps,
            graph,
            hooks: Vec::new(),
        }
    }

    /// Key of the capability under construction.
    pub fn key(&self) -> CapabilityKey {
        self.key
    }

    /// Fetch a declared dependency.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Result<T, GraphError> {
        let wanted = CapabilityKey::of::<T>();
        if !self.deps.contains(&wanted) {
            return Err(GraphError::Undeclared {
                key: wanted,
                requested_by: self.key,
            });
        }
        self.graph.get()
    }

    /// Attach start/stop behaviour to the capability being built.
    pub fn on_lifecycle(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    pub(crate) fn into_hooks(self) -> Vec<Hook> {
        self.hooks
    }
}

/// A post-build action over the resolved graph.
pub struct Invoke {
    name: String,
    priority: i32,
    requires: Vec<CapabilityKey>,
    run: InvokeFn,
}

impl Invoke {
    /// Lower priorities run first; ties keep registration order.
    pub fn new<F>(name: impl Into<String>, priority: i32, f: F) -> Self
    where
        F: FnOnce(&mut InvokeContext<'_>) -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority,
            requires: Vec::new(),
            run: Box::new(f),
        }
    }

    /// Declare capabilities that must be registered for this invoke to run.
    pub fn requires(mut self, keys: &[CapabilityKey]) -> Self {
        self.requires.extend_from_slice(keys);
        self
    }

    /// Copy the built `T` into `slot` once the graph is resolved.
    pub fn populate<T: Clone + Send + Sync + 'static>(priority: i32, slot: &Slot<T>) -> Self {
        let slot = slot.clone();
        let key = CapabilityKey::of::<T>();
        Self::new(format!("populate {key}"), priority, move |ctx| {
            slot.fill(ctx.get::<T>()?);
            Ok(())
        })
        .requires(&[key])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn required(&self) -> &[CapabilityKey] {
        &self.requires
    }

    pub(crate) fn run(self, ctx: &mut InvokeContext<'_>) -> Result<(), BoxError> {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Invoke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoke")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("requires", &self.requires)
            .finish()
    }
}

/// Full-graph view handed to an invoke.
pub struct InvokeContext<'a> {
    graph: &'a ObjectGraph,
    hooks: Vec<(CapabilityKey, Hook)>,
}

impl<'a> InvokeContext<'a> {
    pub(crate) fn new(graph: &'a ObjectGraph) -> Self {
        Self {
            graph,
            hooks: Vec::new(),
        }
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Result<T, GraphError> {
        self.graph.get()
    }

    pub fn graph(&self) -> &ObjectGraph {
        self.graph
    }

    /// Attach start/stop behaviour to an already-built capability.
    pub fn on_lifecycle(&mut self, owner: CapabilityKey, hook: Hook) {
        self.hooks.push((owner, hook));
    }

    pub(crate) fn into_hooks(self) -> Vec<(CapabilityKey, Hook)> {
        self.hooks
    }
}

/// Write-once cell filled by [`Invoke::populate`].
pub struct Slot<T>(Arc<OnceLock<T>>);

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    fn fill(&self, value: T) {
        if self.0.set(value).is_err() {
            tracing::warn!(capability = std::any::type_name::<T>(), "Slot already populated");
        }
    }

    pub fn is_filled(&self) -> bool {
        self.0.get().is_some()
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> Option<T> {
        self.0.get().cloned()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}
