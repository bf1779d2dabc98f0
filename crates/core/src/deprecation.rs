//! Deprecation notices for action names.
//!
//! A plain lookup table consulted explicitly at the call sites that care
//! (the registry warns on resolving a deprecated key). No attribute
//! interception, no registration-time magic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionKey;

/// How strongly a name is discouraged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeprecationStatus {
    /// Still works, superseded by something better.
    Legacy,
    /// Scheduled for removal.
    Deprecated,
}

/// One table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeprecationNotice {
    pub status: DeprecationStatus,

    /// What to use instead, e.g. a replacement key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Action keys that are discouraged, and what to do about it.
#[derive(Debug, Clone, Default)]
pub struct DeprecationTable {
    entries: HashMap<ActionKey, DeprecationNotice>,
}

impl DeprecationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ActionKey, notice: DeprecationNotice) {
        self.entries.insert(key, notice);
    }

    /// Builder form of [`DeprecationTable::insert`].
    pub fn with(mut self, key: ActionKey, notice: DeprecationNotice) -> Self {
        self.insert(key, notice);
        self
    }

    pub fn lookup(&self, key: &ActionKey) -> Option<&DeprecationNotice> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    #[test]
    fn lookup_hits_and_misses() {
        let key = ActionKey::new(ActionKind::Model, "pelican-1");
        let table = DeprecationTable::new().with(
            key.clone(),
            DeprecationNotice {
                status: DeprecationStatus::Deprecated,
                recommendation: Some("model/pelican-2".into()),
            },
        );

        let notice = table.lookup(&key).unwrap();
        assert_eq!(notice.status, DeprecationStatus::Deprecated);
        assert_eq!(notice.recommendation.as_deref(), Some("model/pelican-2"));

        let other = ActionKey::new(ActionKind::Model, "pelican-2");
        assert!(table.lookup(&other).is_none());
    }

    #[test]
    fn empty_table() {
        let table = DeprecationTable::new();
        assert!(table.is_empty());
    }
}
