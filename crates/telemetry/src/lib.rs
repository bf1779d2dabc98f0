//! # Spindle Telemetry
//!
//! Span tracking around action invocations. The runtime emits a span start
//! before each invocation and a span end with the result; where those spans
//! go is a [`SpanSink`] implementation's concern. The default sink forwards
//! to the `tracing` ecosystem; tests use [`InMemorySink`] to assert on what
//! was emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// A model action invocation.
    Model,
    /// A tool action invocation.
    Tool,
    /// Any other action invocation (flow, retriever, ...).
    Action,
    /// A full generation turn (request → final answer or interrupt).
    Turn,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Tool => write!(f, "tool"),
            Self::Action => write!(f, "action"),
            Self::Turn => write!(f, "turn"),
        }
    }
}

/// A single traced invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier.
    pub id: String,
    /// Parent span id (None for root spans).
    pub parent_id: Option<String>,
    /// What kind of work this represents.
    pub kind: SpanKind,
    /// Human-readable label (e.g. `tool/add`).
    pub label: String,
    /// When the span started.
    pub started_at: DateTime<Utc>,
    /// When the span ended (None if still running).
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Whether the invocation succeeded.
    pub success: Option<bool>,
    /// Input/output/error attributes.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Span {
    /// Create a new span with the given kind and label.
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            kind,
            label: label.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            success: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Set the parent span.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attach an attribute (input, output, error, ...).
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Attach an attribute on a running span.
    pub fn record(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Mark the span as ended with the given success status.
    pub fn end(&mut self, success: bool) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.success = Some(success);
    }
}

/// Where spans are reported. Implementations must be cheap and non-blocking;
/// the runtime calls these inline around every invocation.
pub trait SpanSink: Send + Sync {
    fn span_start(&self, span: &Span);
    fn span_end(&self, span: &Span);
}

/// A sink that drops everything.
#[derive(Debug, Default)]
pub struct NoopSink;

impl SpanSink for NoopSink {
    fn span_start(&self, _span: &Span) {}
    fn span_end(&self, _span: &Span) {}
}

/// Forwards span boundaries to the `tracing` ecosystem as events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl SpanSink for TracingSink {
    fn span_start(&self, span: &Span) {
        tracing::debug!(
            span_id = %span.id,
            kind = %span.kind,
            label = %span.label,
            "span start"
        );
    }

    fn span_end(&self, span: &Span) {
        tracing::debug!(
            span_id = %span.id,
            kind = %span.kind,
            label = %span.label,
            duration_ms = span.duration_ms,
            success = span.success,
            "span end"
        );
    }
}

/// Collects ended spans in memory. Intended for tests and diagnostics.
#[derive(Debug, Default)]
pub struct InMemorySink {
    spans: RwLock<Vec<Span>>,
}

impl InMemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of every ended span, in completion order.
    pub fn ended(&self) -> Vec<Span> {
        self.spans.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.spans.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpanSink for InMemorySink {
    fn span_start(&self, _span: &Span) {}

    fn span_end(&self, span: &Span) {
        self.spans.write().unwrap().push(span.clone());
    }
}
