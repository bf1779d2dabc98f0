//! Plugin trait — the source of actions the registry does not own itself.
//!
//! A plugin can register actions eagerly at startup (`init`), materialize
//! them lazily on first lookup (`resolve`, invoked at most once per key by
//! the registry), and advertise actions it could produce without having
//! produced them yet (`list_available`).

use async_trait::async_trait;

use spindle_core::{ActionKind, ActionMetadata, Result};
use spindle_runtime::Action;

/// A pluggable action source.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The unique plugin name (used in logs and error messages).
    fn name(&self) -> &str;

    /// Actions to register eagerly at startup.
    async fn init(&self) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    /// Materialize an action on first lookup.
    ///
    /// `Ok(None)` means this plugin does not provide the requested action.
    /// This hook may perform I/O (e.g. a credential check); the registry
    /// guarantees it runs at most once per key per resolution attempt.
    async fn resolve(&self, kind: ActionKind, name: &str) -> Result<Option<Action>> {
        let _ = (kind, name);
        Ok(None)
    }

    /// Metadata for every action this plugin can produce, materialized or
    /// not.
    async fn list_available(&self) -> Result<Vec<ActionMetadata>> {
        Ok(Vec::new())
    }
}
