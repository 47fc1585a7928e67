//! Resolved object graph.
//!
//! Immutable once the injector hands it out; request handlers read the same
//! instances concurrently.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::composition::key::CapabilityKey;

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Errors raised when reading capabilities out of a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// No instance has been built for the key.
    #[error("capability {0} has not been built")]
    Missing(CapabilityKey),

    /// A constructor asked for a key it did not declare as a dependency.
    #[error("capability {key} was not declared as a dependency of {requested_by}")]
    Undeclared {
        key: CapabilityKey,
        requested_by: CapabilityKey,
    },
}

/// Singleton instances keyed by capability.
#[derive(Default)]
pub struct ObjectGraph {
    instances: HashMap<CapabilityKey, Instance>,
}

impl ObjectGraph {
    pub(crate) fn insert(&mut self, key: CapabilityKey, instance: Instance) {
        self.instances.insert(key, instance);
    }

    /// Get a clone of the singleton built for `T`.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Result<T, GraphError> {
        let key = CapabilityKey::of::<T>();
        self.instances
            .get(&key)
            .and_then(|instance| instance.downcast_ref::<T>())
            .cloned()
            .ok_or(GraphError::Missing(key))
    }

    /// Whether an instance exists for `key`.
    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Number of built capabilities.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl std::fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.instances.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_same_instance() {
        let mut graph = ObjectGraph::default();
        let store = Arc::new(String::from("deals"));
        graph.insert(CapabilityKey::of::<Arc<String>>(), Arc::new(store.clone()));

        let a: Arc<String> = graph.get().unwrap();
        let b: Arc<String> = graph.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &store));
    }

    #[test]
    fn test_missing_capability() {
        let graph = ObjectGraph::default();
        let err = graph.get::<Arc<u32>>().unwrap_err();
        assert!(matches!(err, GraphError::Missing(_)));
        assert!(graph.is_empty());
    }
}
