//! # Spindle Registry
//!
//! The store of `(kind, name) → Action`, plus the set of plugins that can
//! still produce actions lazily. Registration is eager and synchronous;
//! resolution may suspend while a plugin's lazy hook runs (possibly doing
//! I/O), with the resolve-once guarantee: concurrent lookups of the same
//! unresolved key share a single in-flight attempt, successes are cached
//! forever, failures are not cached.

pub mod discovery;
pub mod plugin;
pub mod registry;

pub use discovery::{discover_plugins, PluginManifest};
pub use plugin::Plugin;
pub use registry::Registry;
