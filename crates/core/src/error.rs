//! Error types for the Spindle domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum under a top-level `Error`.
//!
//! The tool interrupt signal is deliberately *absent* from this taxonomy:
//! suspension is modeled as [`crate::tool::ToolOutcome::Interrupted`], a
//! value, not an error.

use thiserror::Error;

use crate::action::{ActionKey, ActionKind};

/// The top-level error type for all Spindle operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Action invocation errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Generation errors ---
    #[error("Generate error: {0}")]
    Generate(#[from] GenerateError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Registration and resolution failures.
///
/// `Clone` because a single failed resolution attempt is fanned out to every
/// caller waiting on that attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Action already registered: {key}")]
    DuplicateAction { key: ActionKey },

    #[error("Action not found: {key}")]
    NotFound { key: ActionKey },

    #[error("Invalid action key {raw:?}: expected exactly one '/' between a known kind and a non-empty name")]
    InvalidKey { raw: String },

    #[error("Plugin '{plugin}' failed: {reason}")]
    PluginFailed { plugin: String, reason: String },

    #[error("No usable action source: every plugin failed and nothing is registered")]
    NoUsableSource,
}

/// A failure raised by (or around) a wrapped action function.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Action {kind}/{name} failed: {cause}")]
    ExecutionFailed {
        kind: ActionKind,
        name: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("Invalid input for {kind}/{name}: {reason}")]
    InvalidInput {
        kind: ActionKind,
        name: String,
        reason: String,
    },

    #[error("Invalid output from {kind}/{name}: {reason}")]
    InvalidOutput {
        kind: ActionKind,
        name: String,
        reason: String,
    },
}

impl ActionError {
    /// Wrap an arbitrary failure from the function behind `kind/name`.
    pub fn execution(kind: ActionKind, name: impl Into<String>, cause: Error) -> Self {
        Self::ExecutionFailed {
            kind,
            name: name.into(),
            cause: Box::new(cause),
        }
    }
}

/// Failures of the generation loop itself.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Turn limit of {limit} model rounds exceeded")]
    TurnLimitExceeded { limit: usize },

    #[error("Failed to parse final output: {reason}")]
    Parse { reason: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Resume is missing a tool response for interrupted call {ref_id:?} (tool '{tool}')")]
    MissingToolReply { ref_id: String, tool: String },

    #[error("Resume supplied a tool response for unknown call {ref_id:?}")]
    UnknownToolReply { ref_id: String },

    #[error("Resume requires a trailing model message with outstanding tool requests")]
    NothingToResume,
}
