//! Message and Part domain types.
//!
//! A conversation is an ordered list of messages; each message carries a
//! list of typed parts. Tool requests and responses are parts, so a single
//! model message can interleave text with any number of tool calls, and a
//! tool message answers them positionally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules)
    System,
    /// The end user
    User,
    /// The generating model
    Model,
    /// Tool execution results
    Tool,
}

/// A request by the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation id matching this request to its response.
    #[serde(rename = "ref")]
    pub ref_id: String,

    /// Name of the tool to invoke.
    pub name: String,

    /// The tool's input, shaped by its input schema.
    pub input: serde_json::Value,
}

impl ToolRequest {
    /// Create a request with a fresh correlation id.
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            ref_id: Uuid::new_v4().to_string(),
            name: name.into(),
            input,
        }
    }

    pub fn with_ref(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = ref_id.into();
        self
    }
}

/// The answer to a [`ToolRequest`], matched by `ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(rename = "ref")]
    pub ref_id: String,

    pub name: String,

    pub output: serde_json::Value,
}

impl ToolResponse {
    pub fn new(
        ref_id: impl Into<String>,
        name: impl Into<String>,
        output: serde_json::Value,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            name: name.into(),
            output,
        }
    }

    /// The response answering a given request.
    pub fn for_request(request: &ToolRequest, output: serde_json::Value) -> Self {
        Self::new(request.ref_id.clone(), request.name.clone(), output)
    }
}

/// One typed piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text { text: String },

    /// The model asks for a tool invocation.
    ToolRequest(ToolRequest),

    /// A tool invocation's result.
    ToolResponse(ToolResponse),

    /// A media reference (image, audio, ...).
    Media { content_type: String, url: String },

    /// Provider- or application-specific content.
    Custom { data: serde_json::Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        match self {
            Self::ToolRequest(req) => Some(req),
            _ => None,
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        match self {
            Self::ToolResponse(res) => Some(res),
            _ => None,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// Ordered typed content parts
    pub content: Vec<Part>,

    /// Optional metadata (provider info, annotations, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, content: Vec<Part>) -> Self {
        Self {
            role,
            content,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create a system message with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    /// Create a model message from parts.
    pub fn model(content: Vec<Part>) -> Self {
        Self::new(Role::Model, content)
    }

    /// Create a model message with a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![Part::text(text)])
    }

    /// Create a tool message answering the given requests.
    pub fn tool(responses: Vec<ToolResponse>) -> Self {
        Self::new(Role::Tool, responses.into_iter().map(Part::ToolResponse).collect())
    }

    /// All text parts concatenated, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// All tool-request parts, in order.
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content.iter().filter_map(Part::as_tool_request).collect()
    }

    /// All tool-response parts, in order.
    pub fn tool_responses(&self) -> Vec<&ToolResponse> {
        self.content.iter().filter_map(Part::as_tool_response).collect()
    }
}
