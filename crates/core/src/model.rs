//! Model request/response wire shapes.
//!
//! A model action's wrapped function accepts a serialized [`ModelRequest`]
//! and returns (or streams toward) a [`ModelResponse`]. Concrete provider
//! clients live outside this workspace; these types are the boundary.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must not call tools.
    None,
}

/// Requested shape of the final output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Format name understood by a formatter (e.g. "text", "json").
    pub format: String,

    /// Optional JSON Schema constraining the parsed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

impl OutputSpec {
    pub fn json() -> Self {
        Self { format: "json".into(), schema: None }
    }

    pub fn json_with_schema(schema: serde_json::Value) -> Self {
        Self { format: "json".into(), schema: Some(schema) }
    }

    pub fn text() -> Self {
        Self { format: "text".into(), schema: None }
    }
}

/// The request handed to a model action for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The accumulated conversation.
    pub messages: Vec<Message>,

    /// Tools the model may call this round.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Tool-usage constraint.
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Requested output format, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSpec>,

    /// Provider-specific generation config (temperature, max tokens, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::default(),
            output: None,
            config: None,
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// Natural end of generation.
    Stop,
    /// Token limit reached.
    Length,
    /// Content was blocked by the provider.
    Blocked,
    /// Anything else the provider reports.
    Other,
}

/// Token usage for one model round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another round's usage into this one.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A complete response from a model action for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated message (role should be [`crate::message::Role::Model`]).
    pub message: Message,

    /// Token usage for this round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Provider-specific metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ModelResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            finish_reason: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Part, ToolRequest};

    #[test]
    fn request_defaults() {
        let req = ModelRequest::new(vec![Message::user("hi")]);
        assert_eq!(req.tool_choice, ToolChoice::Auto);
        assert!(req.tools.is_empty());
        assert!(req.output.is_none());
    }

    #[test]
    fn request_serialization_skips_empty() {
        let req = ModelRequest::new(vec![Message::user("hi")]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("tools"));
        assert!(!json.contains("output"));
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.add(&Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 });
        total.add(&Usage { prompt_tokens: 7, completion_tokens: 3, total_tokens: 10 });
        assert_eq!(total.prompt_tokens, 17);
        assert_eq!(total.total_tokens, 25);
    }

    #[test]
    fn response_roundtrip() {
        let res = ModelResponse::new(Message::model(vec![
            Part::text("calling"),
            Part::ToolRequest(ToolRequest::new("add", serde_json::json!({"a": 2, "b": 3}))),
        ]))
        .with_usage(Usage { prompt_tokens: 1, completion_tokens: 2, total_tokens: 3 });

        let json = serde_json::to_string(&res).unwrap();
        let back: ModelResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message.tool_requests().len(), 1);
        assert_eq!(back.usage.unwrap().total_tokens, 3);
    }
}
