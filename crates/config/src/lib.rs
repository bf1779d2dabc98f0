//! Configuration loading and validation for the Spindle runtime.
//!
//! Loads a TOML file, applies `SPINDLE_*` environment variable overrides,
//! and validates the result at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use spindle_core::{Error, Result};

/// The root runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Name of the model action used when a request does not pick one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum model rounds per generation turn.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Directory scanned for plugin manifests at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_dir: Option<PathBuf>,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_model() -> String {
    "model".into()
}

fn default_max_turns() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Whether invocation spans are emitted at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            max_turns: default_max_turns(),
            plugin_dir: None,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config {}: {e}", path.display()),
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("malformed config {}: {e}", path.display()),
        })?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        debug!(path = %path.display(), "loaded runtime config");
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SPINDLE_*` overrides read through `get` (injectable for
    /// tests).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = get("SPINDLE_DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(raw) = get("SPINDLE_MAX_TURNS") {
            self.max_turns = raw.parse().map_err(|_| Error::Config {
                message: format!("SPINDLE_MAX_TURNS must be a positive integer, got {raw:?}"),
            })?;
        }
        if let Some(dir) = get("SPINDLE_PLUGIN_DIR") {
            self.plugin_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get("SPINDLE_TELEMETRY") {
            self.telemetry.enabled = raw.parse().map_err(|_| Error::Config {
                message: format!("SPINDLE_TELEMETRY must be true or false, got {raw:?}"),
            })?;
        }
        Ok(())
    }

    /// Check invariants the rest of the runtime relies on.
    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(Error::Config {
                message: "default_model must not be empty".into(),
            });
        }
        if self.max_turns == 0 {
            return Err(Error::Config {
                message: "max_turns must be at least 1".into(),
            });
        }
        Ok(())
    }
}
