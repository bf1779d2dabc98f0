//! Tool invocation outcomes and interrupts.
//!
//! A tool either completes with a value or suspends the whole generation
//! turn. Suspension is a *value* ([`ToolOutcome::Interrupted`]), not an
//! error: the orchestrator converts it into an [`Interrupt`] handed back to
//! the caller, who later resumes with a matching tool response.

use serde::{Deserialize, Serialize};

use crate::message::ToolRequest;

/// The result of invoking one tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool returned normally.
    Completed(serde_json::Value),

    /// The tool suspended the turn, optionally attaching metadata for the
    /// caller (e.g. what approval is being waited on).
    Interrupted(Option<serde_json::Value>),
}

/// The serialized form of a [`ToolOutcome`] as it crosses the uniform
/// action boundary (actions exchange plain JSON values).
///
/// The tag field is namespaced so an arbitrary tool payload cannot collide
/// with it by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__tool_reply", rename_all = "snake_case")]
pub enum ToolReply {
    Completed {
        value: serde_json::Value,
    },
    Interrupted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl ToolReply {
    /// Encode an outcome into the JSON value an action returns.
    pub fn encode(outcome: ToolOutcome) -> serde_json::Value {
        let reply = match outcome {
            ToolOutcome::Completed(value) => ToolReply::Completed { value },
            ToolOutcome::Interrupted(metadata) => ToolReply::Interrupted { metadata },
        };
        // Tagged enum of plain JSON values cannot fail to serialize.
        serde_json::to_value(reply).unwrap_or(serde_json::Value::Null)
    }

    /// Decode an action's output value back into an outcome.
    ///
    /// Values produced by [`ToolReply::encode`] round-trip; any other value
    /// came from a raw tool action and counts as a plain completion.
    pub fn decode(value: serde_json::Value) -> ToolOutcome {
        match serde_json::from_value::<ToolReply>(value.clone()) {
            Ok(ToolReply::Completed { value }) => ToolOutcome::Completed(value),
            Ok(ToolReply::Interrupted { metadata }) => ToolOutcome::Interrupted(metadata),
            Err(_) => ToolOutcome::Completed(value),
        }
    }
}

/// A suspension of a generation turn, raised by a tool instead of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    /// The tool request that triggered the suspension.
    pub request: ToolRequest,

    /// Metadata the tool attached at suspend time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Interrupt {
    pub fn new(request: ToolRequest, metadata: Option<serde_json::Value>) -> Self {
        Self { request, metadata }
    }
}
