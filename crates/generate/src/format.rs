//! Output formatters.
//!
//! When a caller requests a typed final output, the orchestrator hands the
//! model's final message to a formatter exactly once, at the end of the
//! turn. A parse failure is a final error, never a retry trigger.

use serde_json::Value;

use spindle_core::{Error, GenerateError, Message, OutputSpec, Result};

/// Extracts a typed value from the model's final message.
pub trait Formatter: Send + Sync {
    /// The format name callers put in [`OutputSpec::format`].
    fn name(&self) -> &str;

    fn parse_final(&self, message: &Message, spec: &OutputSpec) -> Result<Value>;
}

/// Passes the concatenated text parts through as a JSON string.
#[derive(Debug, Default)]
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn name(&self) -> &str {
        "text"
    }

    fn parse_final(&self, message: &Message, _spec: &OutputSpec) -> Result<Value> {
        Ok(Value::String(message.text()))
    }
}

/// Parses the concatenated text parts as a JSON document.
///
/// Models routinely wrap JSON in a fenced code block; the fence is stripped
/// before parsing.
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &str {
        "json"
    }

    fn parse_final(&self, message: &Message, _spec: &OutputSpec) -> Result<Value> {
        let text = message.text();
        let stripped = strip_code_fence(text.trim());
        serde_json::from_str(stripped).map_err(|e| {
            Error::Generate(GenerateError::Parse {
                reason: format!("invalid JSON in final output: {e}"),
            })
        })
    }
}

/// Strip a single surrounding ``` fence (with optional language tag).
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.split_once('\n').map(|(_, body)| body) else {
        return text;
    };
    body.trim_end().strip_suffix("```").map(str::trim_end).unwrap_or(text)
}
