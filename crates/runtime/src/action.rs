//! The Action — a named, kinded, uniformly invocable unit.
//!
//! The wrapped callable comes in two shapes, [`Invocable::Blocking`] and
//! [`Invocable::Suspending`]; everything above this module programs against
//! [`Action`] and never sees the difference. Blocking functions are moved
//! off the cooperative executor before they run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use spindle_core::{
    ActionError, ActionKey, ActionKind, ActionMetadata, Error, ModelRequest, ModelResponse,
    Result, ToolDefinition, ToolOutcome, ToolReply,
};
use spindle_stream::{channel, run_to_completion, ChunkReceiver, StreamError};
use spindle_telemetry::{Span, SpanKind};

use crate::context::ActionRunContext;

type BoxedInvokeFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// The two concrete shapes of a wrapped action function.
#[derive(Clone)]
pub enum Invocable {
    /// A natively synchronous function.
    Blocking(Arc<dyn Fn(Value, ActionRunContext) -> Result<Value> + Send + Sync>),

    /// A natively asynchronous function.
    Suspending(Arc<dyn Fn(Value, ActionRunContext) -> BoxedInvokeFuture + Send + Sync>),
}

/// A registered, immutable, uniformly invocable unit.
#[derive(Clone)]
pub struct Action {
    metadata: ActionMetadata,
    invocable: Invocable,
}

impl Action {
    /// Wrap a natively synchronous function.
    pub fn blocking<F>(metadata: ActionMetadata, f: F) -> Self
    where
        F: Fn(Value, ActionRunContext) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            metadata,
            invocable: Invocable::Blocking(Arc::new(f)),
        }
    }

    /// Wrap a natively asynchronous function.
    pub fn suspending<F, Fut>(metadata: ActionMetadata, f: F) -> Self
    where
        F: Fn(Value, ActionRunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            metadata,
            invocable: Invocable::Suspending(Arc::new(move |input, ctx| Box::pin(f(input, ctx)))),
        }
    }

    /// Wrap a typed model function: `ModelRequest → ModelResponse`.
    pub fn model<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ModelRequest, ActionRunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ModelResponse>> + Send + 'static,
    {
        let name = name.into();
        let metadata = ActionMetadata::new(ActionKind::Model, name.clone());
        Self::suspending(metadata, move |input, ctx| {
            let name = name.clone();
            let started = serde_json::from_value::<ModelRequest>(input).map(|req| f(req, ctx));
            async move {
                match started {
                    Ok(fut) => {
                        let response = fut.await?;
                        serde_json::to_value(response).map_err(|e| {
                            Error::Action(ActionError::InvalidOutput {
                                kind: ActionKind::Model,
                                name,
                                reason: e.to_string(),
                            })
                        })
                    }
                    Err(e) => Err(Error::Action(ActionError::InvalidInput {
                        kind: ActionKind::Model,
                        name,
                        reason: e.to_string(),
                    })),
                }
            }
        })
    }

    /// Wrap a typed tool function: input value → [`ToolOutcome`].
    ///
    /// The outcome crosses the uniform value boundary as a tagged
    /// [`ToolReply`], so suspension survives the trip without being an
    /// error.
    pub fn tool<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        f: F,
    ) -> Self
    where
        F: Fn(Value, ActionRunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutcome>> + Send + 'static,
    {
        let metadata = ActionMetadata::new(ActionKind::Tool, name)
            .with_description(description)
            .with_input_schema(input_schema);
        Self::suspending(metadata, move |input, ctx| {
            let fut = f(input, ctx);
            async move { Ok(ToolReply::encode(fut.await?)) }
        })
    }

    pub fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> ActionKind {
        self.metadata.kind
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn key(&self) -> ActionKey {
        self.metadata.key()
    }

    /// The tool definition advertised to models, for tool actions.
    pub fn tool_definition(&self) -> Option<ToolDefinition> {
        (self.kind() == ActionKind::Tool).then(|| ToolDefinition {
            name: self.metadata.name.clone(),
            description: self.metadata.description.clone().unwrap_or_default(),
            input_schema: self
                .metadata
                .input_schema
                .clone()
                .unwrap_or_else(|| serde_json::json!({"type": "object"})),
        })
    }

    /// Invoke the wrapped function, whichever shape it has.
    ///
    /// A span is emitted around the invocation through the context's sink.
    /// Failures of the wrapped function come back as
    /// [`ActionError::ExecutionFailed`] tagged with this action's identity.
    pub async fn run(&self, input: Value, ctx: ActionRunContext) -> Result<Value> {
        let mut span = Span::new(self.span_kind(), self.key().to_string())
            .with_attribute("input", input.clone());
        let sink = ctx.span_sink();
        sink.span_start(&span);

        debug!(action = %self.key(), "invoking action");

        let result: Result<Value> = match &self.invocable {
            Invocable::Suspending(f) => f(input, ctx).await,
            Invocable::Blocking(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(input, ctx)).await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Internal(format!("blocking action panicked: {e}"))),
                }
            }
        };

        let result = result.map_err(|cause| {
            Error::Action(ActionError::execution(self.kind(), self.name(), cause))
        });

        match &result {
            Ok(output) => {
                span.record("output", output.clone());
                span.end(true);
            }
            Err(e) => {
                span.record("error", Value::String(e.to_string()));
                span.end(false);
            }
        }
        sink.span_end(&span);

        result
    }

    /// Invoke from a synchronous call site.
    ///
    /// Transparently drives the invocation to completion whether or not the
    /// calling thread is already inside a running runtime.
    pub fn run_sync(&self, input: Value, ctx: ActionRunContext) -> Result<Value> {
        run_to_completion(self.run(input, ctx))
    }

    /// Invoke with streaming: returns immediately with a single-pass chunk
    /// sequence and a separately awaitable final result.
    ///
    /// A fresh chunk channel is wired into the context; the channel closes
    /// when the wrapped function returns, carrying the failure as the
    /// terminal signal if it failed.
    pub fn stream(
        &self,
        input: Value,
        ctx: ActionRunContext,
    ) -> (ChunkReceiver<Value>, ResponseHandle) {
        let (tx, rx) = channel();
        let tx = Arc::new(tx);
        let streaming_ctx = ctx.with_chunks(Arc::clone(&tx));
        let (final_tx, final_rx) = oneshot::channel();

        let action = self.clone();
        tokio::spawn(async move {
            let result = action.run(input, streaming_ctx).await;
            match &result {
                Ok(_) => tx.close(),
                Err(e) => tx.close_with_error(StreamError::Terminal(e.to_string())),
            }
            let _ = final_tx.send(result);
        });

        (rx, ResponseHandle { rx: final_rx })
    }

    fn span_kind(&self) -> SpanKind {
        match self.kind() {
            ActionKind::Model => SpanKind::Model,
            ActionKind::Tool => SpanKind::Tool,
            _ => SpanKind::Action,
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("key", &self.key().to_string())
            .field(
                "invocable",
                &match &self.invocable {
                    Invocable::Blocking(_) => "blocking",
                    Invocable::Suspending(_) => "suspending",
                },
            )
            .finish()
    }
}

/// The separately awaitable final result of a streaming invocation.
pub struct ResponseHandle {
    rx: oneshot::Receiver<Result<Value>>,
}

impl Future for ResponseHandle {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(|res| match res {
            Ok(result) => result,
            Err(_) => Err(Error::Internal(
                "streaming invocation dropped before completing".into(),
            )),
        })
    }
}
