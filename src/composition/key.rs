//! Capability identifiers.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies an abstract capability by the Rust type that carries it.
///
/// Two keys are equal iff they were derived from the same type. The type
/// name is kept only for diagnostics.
#[derive(Clone, Copy)]
pub struct CapabilityKey {
    id: TypeId,
    name: &'static str,
}

impl CapabilityKey {
    /// Key for capability type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name of the capability.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for CapabilityKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CapabilityKey {}

impl Hash for CapabilityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Journal;

    #[test]
    fn test_key_identity() {
        assert_eq!(CapabilityKey::of::<Arc<Journal>>(), CapabilityKey::of::<Arc<Journal>>());
        assert_ne!(CapabilityKey::of::<Arc<Journal>>(), CapabilityKey::of::<Journal>());
    }

    #[test]
    fn test_key_display() {
        let key = CapabilityKey::of::<Journal>();
        assert!(key.to_string().ends_with("Journal"));
    }
}
