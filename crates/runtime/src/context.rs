//! Per-invocation run context.
//!
//! Each in-flight invocation owns exactly one `ActionRunContext`. Nested
//! sub-invocations (a tool called from inside a model call) receive a child
//! context sharing the same logical context map; nesting is explicit, never
//! ambient global state.

use std::sync::Arc;

use spindle_stream::{ChunkSender, StreamError};
use spindle_telemetry::{SpanSink, TracingSink};

/// The handle passed to every action function.
#[derive(Clone)]
pub struct ActionRunContext {
    chunks: Option<Arc<ChunkSender<serde_json::Value>>>,
    context: Arc<serde_json::Map<String, serde_json::Value>>,
    spans: Arc<dyn SpanSink>,
}

impl Default for ActionRunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRunContext {
    /// A non-streaming context with an empty context map and the default
    /// tracing span sink.
    pub fn new() -> Self {
        Self {
            chunks: None,
            context: Arc::new(serde_json::Map::new()),
            spans: Arc::new(TracingSink),
        }
    }

    /// Replace the read-only context map (auth claims, session data, ...).
    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = Arc::new(context);
        self
    }

    /// Replace the span sink.
    pub fn with_span_sink(mut self, spans: Arc<dyn SpanSink>) -> Self {
        self.spans = spans;
        self
    }

    /// Wire a chunk sender in; the invocation becomes a streaming one.
    pub(crate) fn with_chunks(mut self, chunks: Arc<ChunkSender<serde_json::Value>>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    /// Whether the caller asked for incremental output.
    pub fn is_streaming(&self) -> bool {
        self.chunks.is_some()
    }

    /// Emit one incremental chunk.
    ///
    /// A no-op when the caller did not ask for streaming, so actions can
    /// emit unconditionally; fails only if a streaming consumer has already
    /// gone away.
    pub fn send_chunk(&self, chunk: serde_json::Value) -> Result<(), StreamError> {
        match &self.chunks {
            Some(sender) => sender.send(chunk),
            None => Ok(()),
        }
    }

    /// The read-only context map.
    pub fn context(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.context
    }

    /// The span sink for this invocation.
    pub fn span_sink(&self) -> Arc<dyn SpanSink> {
        Arc::clone(&self.spans)
    }

    /// A child context for a nested sub-invocation.
    ///
    /// Shares the context map and span sink; does *not* inherit the chunk
    /// sender — a nested invocation streams only if its own caller wires a
    /// channel in.
    pub fn child(&self) -> Self {
        Self {
            chunks: None,
            context: Arc::clone(&self.context),
            spans: Arc::clone(&self.spans),
        }
    }
}
