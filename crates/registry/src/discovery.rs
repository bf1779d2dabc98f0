//! Plugin manifest discovery.
//!
//! An explicit, testable directory scan invoked once by the composition
//! root. It returns the discovered manifests; attaching the corresponding
//! plugins to a registry is the caller's decision. No global state is
//! touched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use spindle_core::{Error, Result};

/// A plugin manifest file (`<name>.plugin.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// The plugin name.
    pub name: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Composite `kind/name` keys of the actions this plugin advertises.
    #[serde(default)]
    pub provides: Vec<String>,

    /// Plugin-specific settings, passed through opaquely.
    #[serde(default)]
    pub settings: toml::Table,
}

const MANIFEST_SUFFIX: &str = ".plugin.toml";

/// Scan a directory for plugin manifests.
///
/// Reads every `*.plugin.toml` file directly under `dir` and returns the
/// parsed manifests sorted by plugin name. A missing directory or a
/// malformed manifest is an error: discovery runs once at startup and
/// should fail loudly rather than silently drop a plugin.
pub fn discover_plugins(dir: &Path) -> Result<Vec<PluginManifest>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::Config {
        message: format!("cannot scan plugin directory {}: {e}", dir.display()),
    })?;

    let mut manifests = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Config {
            message: format!("cannot read plugin directory entry: {e}"),
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(MANIFEST_SUFFIX) || !path.is_file() {
            continue;
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| Error::Config {
            message: format!("cannot read plugin manifest {}: {e}", path.display()),
        })?;
        let manifest: PluginManifest = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("malformed plugin manifest {}: {e}", path.display()),
        })?;
        debug!(plugin = %manifest.name, path = %path.display(), "discovered plugin manifest");
        manifests.push(manifest);
    }

    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(manifests)
}
