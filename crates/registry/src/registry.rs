//! The action registry.
//!
//! The slot map below is the only structure in the workspace mutated by
//! concurrent callers. Per-key state moves `unresolved → resolving →
//! resolved/failed` under a plain mutex that is never held across an await;
//! waiters follow the in-flight attempt through a `watch` channel, so a
//! thundering herd on a brand-new key still triggers exactly one plugin
//! call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use spindle_core::{
    ActionKey, ActionKind, ActionMetadata, DeprecationTable, Error, RegistryError, Result,
};
use spindle_runtime::Action;

use crate::plugin::Plugin;

type SlotResult = std::result::Result<Arc<Action>, RegistryError>;

enum Role {
    Leader(watch::Sender<Option<SlotResult>>),
    Follower(watch::Receiver<Option<SlotResult>>),
}

/// The store of actions and still-unresolved plugins.
pub struct Registry {
    entries: RwLock<HashMap<ActionKey, Arc<Action>>>,
    slots: Mutex<HashMap<ActionKey, watch::Receiver<Option<SlotResult>>>>,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    deprecations: DeprecationTable,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
            plugins: RwLock::new(Vec::new()),
            deprecations: DeprecationTable::new(),
        }
    }

    /// Attach a table of discouraged action keys; resolving one logs a
    /// warning with the recommended replacement.
    pub fn with_deprecations(mut self, deprecations: DeprecationTable) -> Self {
        self.deprecations = deprecations;
        self
    }

    /// Attach a plugin as a lazy action source.
    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) {
        info!(plugin = plugin.name(), "attached plugin");
        self.plugins.write().unwrap().push(plugin);
    }

    /// Builder form of [`Registry::add_plugin`].
    pub fn with_plugin(self, plugin: Arc<dyn Plugin>) -> Self {
        self.add_plugin(plugin);
        self
    }

    /// Run every plugin's `init` hook, registering the returned actions
    /// eagerly. A duplicate key is fatal to the caller, as with
    /// [`Registry::register`].
    pub async fn initialize(&self) -> Result<()> {
        let plugins: Vec<_> = self.plugins.read().unwrap().clone();
        for plugin in plugins {
            let actions = plugin.init().await.map_err(|e| {
                Error::Registry(RegistryError::PluginFailed {
                    plugin: plugin.name().to_string(),
                    reason: e.to_string(),
                })
            })?;
            let count = actions.len();
            for action in actions {
                self.register(action)?;
            }
            info!(plugin = plugin.name(), actions = count, "initialized plugin");
        }
        Ok(())
    }

    /// Eagerly register an action.
    ///
    /// Fails with [`RegistryError::DuplicateAction`] if `(kind, name)` is
    /// already taken — never a silent overwrite.
    pub fn register(&self, action: Action) -> Result<Arc<Action>> {
        let key = action.key();
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&key) {
            return Err(RegistryError::DuplicateAction { key }.into());
        }
        let action = Arc::new(action);
        entries.insert(key.clone(), Arc::clone(&action));
        info!(action = %key, "registered action");
        Ok(action)
    }

    /// Look up an action, lazily resolving it through the plugins on first
    /// lookup.
    ///
    /// Safe under unbounded concurrent callers for the same key: one caller
    /// leads the resolution, everyone else awaits the same attempt and
    /// receives its result — success or failure. A success is cached
    /// forever; a failure clears the slot so a later lookup retries from
    /// scratch.
    pub async fn resolve(&self, kind: ActionKind, name: &str) -> Result<Arc<Action>> {
        let key = ActionKey::new(kind, name);
        if let Some(notice) = self.deprecations.lookup(&key) {
            warn!(
                action = %key,
                status = ?notice.status,
                recommendation = notice.recommendation.as_deref(),
                "resolving a discouraged action"
            );
        }
        loop {
            if let Some(action) = self.entries.read().unwrap().get(&key) {
                return Ok(Arc::clone(action));
            }

            let role = {
                let mut slots = self.slots.lock().unwrap();
                // Re-check under the slot lock: a leader may have finished
                // between our cache miss and here.
                if let Some(action) = self.entries.read().unwrap().get(&key) {
                    return Ok(Arc::clone(action));
                }
                match slots.get(&key) {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        slots.insert(key.clone(), rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => {
                    // Clears the slot even if this future is dropped
                    // mid-resolution, so waiters can start a fresh attempt.
                    let _guard = SlotGuard { registry: self, key: &key };
                    debug!(action = %key, "resolving lazily");

                    let result = self.resolve_via_plugins(&key).await;
                    if let Ok(action) = &result {
                        self.entries
                            .write()
                            .unwrap()
                            .insert(key.clone(), Arc::clone(action));
                    }
                    drop(_guard);
                    let _ = tx.send(Some(result.clone()));
                    return result.map_err(Error::Registry);
                }
                Role::Follower(mut rx) => {
                    let outcome = loop {
                        if let Some(result) = rx.borrow_and_update().clone() {
                            break Some(result);
                        }
                        if rx.changed().await.is_err() {
                            // The leader vanished without broadcasting;
                            // retry from the top.
                            break None;
                        }
                    };
                    match outcome {
                        Some(result) => return result.map_err(Error::Registry),
                        None => continue,
                    }
                }
            }
        }
    }

    /// Look up an action by its composite `<kind>/<name>` key.
    pub async fn resolve_by_key(&self, raw: &str) -> Result<Arc<Action>> {
        let key = ActionKey::parse(raw).map_err(Error::Registry)?;
        self.resolve(key.kind, &key.name).await
    }

    async fn resolve_via_plugins(&self, key: &ActionKey) -> SlotResult {
        let plugins: Vec<_> = self.plugins.read().unwrap().clone();
        for plugin in plugins {
            match plugin.resolve(key.kind, &key.name).await {
                Ok(Some(action)) => {
                    if action.key() != *key {
                        return Err(RegistryError::PluginFailed {
                            plugin: plugin.name().to_string(),
                            reason: format!(
                                "resolved '{}' when asked for '{}'",
                                action.key(),
                                key
                            ),
                        });
                    }
                    debug!(action = %key, plugin = plugin.name(), "resolved lazily");
                    return Ok(Arc::new(action));
                }
                Ok(None) => continue,
                Err(e) => {
                    return Err(RegistryError::PluginFailed {
                        plugin: plugin.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(RegistryError::NotFound { key: key.clone() })
    }

    /// List every known action: registered ones plus everything the plugins
    /// advertise, de-duplicated by key.
    ///
    /// An individual plugin failure is logged and skipped; the call fails
    /// only when nothing is registered *and* every plugin's listing failed.
    pub async fn list_actions(&self) -> Result<Vec<ActionMetadata>> {
        let mut listed = Vec::new();
        let mut seen = HashSet::new();

        {
            let entries = self.entries.read().unwrap();
            for action in entries.values() {
                let meta = action.metadata().clone();
                if seen.insert(meta.key()) {
                    listed.push(meta);
                }
            }
        }
        let had_registered = !listed.is_empty();

        let plugins: Vec<_> = self.plugins.read().unwrap().clone();
        let plugin_count = plugins.len();
        let mut failures = 0;
        for plugin in plugins {
            match plugin.list_available().await {
                Ok(metas) => {
                    for meta in metas {
                        if seen.insert(meta.key()) {
                            listed.push(meta);
                        }
                    }
                }
                Err(e) => {
                    warn!(plugin = plugin.name(), error = %e, "plugin listing failed; skipping");
                    failures += 1;
                }
            }
        }

        if !had_registered && plugin_count > 0 && failures == plugin_count {
            return Err(RegistryError::NoUsableSource.into());
        }
        Ok(listed)
    }

    /// Number of registered (materialized) actions.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct SlotGuard<'a> {
    registry: &'a Registry,
    key: &'a ActionKey,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.registry.slots.lock().unwrap().remove(self.key);
    }
}
