//! Operation → required trust level.

use std::collections::BTreeMap;

use crate::permission::level::TrustLevel;

/// Immutable mapping from operation name to the minimal trust level it needs.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    required: BTreeMap<String, TrustLevel>,
}

impl PermissionTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TrustLevel)>,
        S: Into<String>,
    {
        Self {
            required: entries
                .into_iter()
                .map(|(op, level)| (op.into(), level))
                .collect(),
        }
    }

    /// Required level for `operation`, or `None` when it is not exposed.
    pub fn required(&self, operation: &str) -> Option<TrustLevel> {
        self.required.get(operation).copied()
    }

    pub fn operations(&self) -> impl Iterator<Item = (&str, TrustLevel)> {
        self.required.iter().map(|(op, level)| (op.as_str(), *level))
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.required.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.required.len()
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}
