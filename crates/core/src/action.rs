//! Action identity and metadata.
//!
//! An action is a named, kinded, uniformly invocable unit. This module
//! defines *what* an action is called and *how* it advertises itself;
//! the invocable body lives in the runtime crate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RegistryError;

/// The kind of an action. Together with the name it forms the action's
/// identity within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// A text/multimodal generation model.
    Model,
    /// A callable capability the model can request mid-generation.
    Tool,
    /// A user-defined composite workflow.
    Flow,
    /// A document retriever.
    Retriever,
    /// An output evaluator.
    Evaluator,
    /// An embedding generator.
    Embedder,
}

impl ActionKind {
    /// All known kinds, in a stable order.
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Model,
        ActionKind::Tool,
        ActionKind::Flow,
        ActionKind::Retriever,
        ActionKind::Evaluator,
        ActionKind::Embedder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Tool => "tool",
            Self::Flow => "flow",
            Self::Retriever => "retriever",
            Self::Evaluator => "evaluator",
            Self::Embedder => "embedder",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "tool" => Ok(Self::Tool),
            "flow" => Ok(Self::Flow),
            "retriever" => Ok(Self::Retriever),
            "evaluator" => Ok(Self::Evaluator),
            "embedder" => Ok(Self::Embedder),
            other => Err(RegistryError::InvalidKey { raw: other.to_string() }),
        }
    }
}

/// The composite identity of an action: `<kind>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    pub kind: ActionKind,
    pub name: String,
}

impl ActionKey {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }

    /// Parse a composite key of the form `<kind>/<name>`.
    ///
    /// Exactly one `/` separator; both sides non-empty; the kind must be a
    /// known [`ActionKind`]. Anything else is an [`RegistryError::InvalidKey`].
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let mut parts = raw.splitn(3, '/');
        let (kind, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(name), None) if !kind.is_empty() && !name.is_empty() => (kind, name),
            _ => return Err(RegistryError::InvalidKey { raw: raw.to_string() }),
        };
        let kind = ActionKind::from_str(kind)
            .map_err(|_| RegistryError::InvalidKey { raw: raw.to_string() })?;
        Ok(Self::new(kind, name))
    }
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Everything an action advertises about itself, minus the invocable body.
///
/// This is what `list_actions` returns, including for actions a plugin has
/// declared but not yet materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub kind: ActionKind,

    pub name: String,

    /// Human-readable description (sent to models for tool actions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Opaque JSON Schema for the action's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,

    /// Opaque JSON Schema for the action's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,

    /// Open key-value metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ActionMetadata {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            input_schema: None,
            output_schema: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The composite identity of this action.
    pub fn key(&self) -> ActionKey {
        ActionKey::new(self.kind, self.name.clone())
    }
}
