//! The generation loop.
//!
//! One turn walks `Sending → Interpreting → ExecutingTools` rounds until
//! the model answers without tool requests, a tool suspends the turn, or
//! the round limit trips. Tool invocations within a round run concurrently,
//! but the synthesized tool message always lists responses in request
//! order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use spindle_core::{
    ActionKind, Error, GenerateError, Interrupt, Message, ModelRequest, ModelResponse,
    OutputSpec, Result, Role, ToolChoice, ToolOutcome, ToolReply, ToolRequest, ToolResponse,
    Usage,
};
use spindle_registry::Registry;
use spindle_runtime::{Action, ActionRunContext};
use spindle_stream::run_to_completion;
use spindle_telemetry::{Span, SpanKind};

use crate::format::{Formatter, JsonFormatter, TextFormatter};

/// A caller's request for one generation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Name of the model action to drive.
    pub model: String,

    /// The conversation so far.
    pub messages: Vec<Message>,

    /// Names of tool actions to offer the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Tool-usage constraint passed through to the model.
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Requested output format, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSpec>,

    /// Provider-specific generation config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            tool_choice: ToolChoice::default(),
            output: None,
            config: None,
        }
    }

    /// Append a user message.
    pub fn with_prompt(mut self, text: impl Into<String>) -> Self {
        self.messages.push(Message::user(text));
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }
}

/// The final answer of a completed turn.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The model's final message.
    pub message: Message,

    /// The full conversation including the final message.
    pub messages: Vec<Message>,

    /// Usage accumulated across every model round of the turn.
    pub usage: Usage,

    /// How many model rounds the turn took.
    pub rounds: usize,

    /// The formatter-parsed value, when an output format was requested.
    pub output: Option<Value>,
}

impl GenerateResponse {
    /// The final message's concatenated text.
    pub fn text(&self) -> String {
        self.message.text()
    }
}

/// The two non-failure ways a turn can end.
///
/// Together with a hard `Err`, callers distinguish exactly three mutually
/// exclusive outcomes.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The model produced a final answer.
    Done(GenerateResponse),

    /// One or more tools suspended the turn. `messages` holds the history
    /// including responses for every tool that *did* complete; supply one
    /// matching tool response per interrupt and resume.
    Interrupted {
        messages: Vec<Message>,
        interrupts: Vec<Interrupt>,
    },
}

/// Drives tool-calling conversations against registered actions.
pub struct Generator {
    registry: Arc<Registry>,
    max_turns: usize,
    formatters: HashMap<String, Arc<dyn Formatter>>,
}

impl Generator {
    /// Default bound on model rounds per turn.
    pub const DEFAULT_MAX_TURNS: usize = 10;

    pub fn new(registry: Arc<Registry>) -> Self {
        let mut formatters: HashMap<String, Arc<dyn Formatter>> = HashMap::new();
        for formatter in [
            Arc::new(TextFormatter) as Arc<dyn Formatter>,
            Arc::new(JsonFormatter) as Arc<dyn Formatter>,
        ] {
            formatters.insert(formatter.name().to_string(), formatter);
        }
        Self {
            registry,
            max_turns: Self::DEFAULT_MAX_TURNS,
            formatters,
        }
    }

    /// Cap the number of model rounds per turn. Exceeding the cap fails
    /// with [`GenerateError::TurnLimitExceeded`] rather than looping on.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Register an output formatter under its own name.
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatters.insert(formatter.name().to_string(), formatter);
        self
    }

    /// Run one generation turn.
    pub async fn generate(
        &self,
        request: GenerateRequest,
        ctx: ActionRunContext,
    ) -> Result<TurnOutcome> {
        let sink = ctx.span_sink();
        let mut span = Span::new(SpanKind::Turn, format!("generate:{}", request.model));
        sink.span_start(&span);

        let result = self.run_loop(request, &ctx).await;

        match &result {
            Ok(TurnOutcome::Done(response)) => {
                span.record("rounds", json!(response.rounds));
                span.end(true);
            }
            Ok(TurnOutcome::Interrupted { interrupts, .. }) => {
                span.record("interrupts", json!(interrupts.len()));
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

    /// Run one generation turn from a synchronous call site.
    pub fn generate_sync(
        &self,
        request: GenerateRequest,
        ctx: ActionRunContext,
    ) -> Result<TurnOutcome> {
        run_to_completion(self.generate(request, ctx))
    }

    /// Resume a previously interrupted turn.
    ///
    /// `request.messages` must be the history handed back with the
    /// interrupts; `replies` must answer every outstanding tool request.
    /// The merged tool message keeps responses in request order, then the
    /// turn re-enters the loop.
    pub async fn resume(
        &self,
        mut request: GenerateRequest,
        replies: Vec<ToolResponse>,
        ctx: ActionRunContext,
    ) -> Result<TurnOutcome> {
        request.messages = merge_replies(request.messages, replies)?;
        self.generate(request, ctx).await
    }

    async fn run_loop(
        &self,
        request: GenerateRequest,
        ctx: &ActionRunContext,
    ) -> Result<TurnOutcome> {
        let model = self.registry.resolve(ActionKind::Model, &request.model).await?;

        let mut offered = HashMap::new();
        let mut tool_defs = Vec::new();
        for name in &request.tools {
            let action = self.registry.resolve(ActionKind::Tool, name).await?;
            if let Some(def) = action.tool_definition() {
                tool_defs.push(def);
            }
            offered.insert(name.clone(), action);
        }

        let mut messages = request.messages.clone();
        let mut usage = Usage::default();

        for round in 1..=self.max_turns {
            debug!(model = %request.model, round, "model round");

            let model_request = ModelRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                tool_choice: request.tool_choice,
                output: request.output.clone(),
                config: request.config.clone(),
            };
            // The model call keeps the caller's context so streamed chunks
            // pass straight through; tools get non-streaming children.
            let raw = model
                .run(serde_json::to_value(&model_request)?, ctx.clone())
                .await?;
            let response: ModelResponse = serde_json::from_value(raw)?;
            if let Some(round_usage) = &response.usage {
                usage.add(round_usage);
            }
            if response.message.content.is_empty() {
                return Err(GenerateError::EmptyResponse.into());
            }

            let requests: Vec<ToolRequest> = response
                .message
                .tool_requests()
                .into_iter()
                .cloned()
                .collect();
            messages.push(response.message.clone());

            if requests.is_empty() {
                let output = self.parse_output(&request, &response.message)?;
                return Ok(TurnOutcome::Done(GenerateResponse {
                    message: response.message,
                    messages,
                    usage,
                    rounds: round,
                    output,
                }));
            }

            debug!(count = requests.len(), round, "executing tool requests");
            let outcomes = self.execute_tools(&requests, &offered, ctx).await?;

            let mut completed = Vec::new();
            let mut interrupts = Vec::new();
            for (request_part, outcome) in outcomes {
                match outcome {
                    ToolOutcome::Completed(value) => {
                        completed.push(ToolResponse::for_request(&request_part, value));
                    }
                    ToolOutcome::Interrupted(metadata) => {
                        interrupts.push(Interrupt::new(request_part, metadata));
                    }
                }
            }

            if !interrupts.is_empty() {
                debug!(interrupts = interrupts.len(), completed = completed.len(), "turn interrupted");
                if !completed.is_empty() {
                    messages.push(Message::tool(completed));
                }
                return Ok(TurnOutcome::Interrupted { messages, interrupts });
            }

            messages.push(Message::tool(completed));
        }

        Err(GenerateError::TurnLimitExceeded { limit: self.max_turns }.into())
    }

    /// Invoke every requested tool, concurrently, and return the outcomes
    /// in request order. A tool's ordinary failure is terminal for the
    /// whole turn.
    async fn execute_tools(
        &self,
        requests: &[ToolRequest],
        offered: &HashMap<String, Arc<Action>>,
        ctx: &ActionRunContext,
    ) -> Result<Vec<(ToolRequest, ToolOutcome)>> {
        let invocations = requests.iter().map(|request| {
            let offered_action = offered.get(&request.name).cloned();
            async move {
                let action = match offered_action {
                    Some(action) => action,
                    None => self.registry.resolve(ActionKind::Tool, &request.name).await?,
                };
                let output = action.run(request.input.clone(), ctx.child()).await?;
                Ok::<_, Error>((request.clone(), ToolReply::decode(output)))
            }
        });
        join_all(invocations).await.into_iter().collect()
    }

    fn parse_output(&self, request: &GenerateRequest, message: &Message) -> Result<Option<Value>> {
        let Some(spec) = &request.output else {
            return Ok(None);
        };
        let formatter = self.formatters.get(&spec.format).ok_or_else(|| {
            Error::Generate(GenerateError::Parse {
                reason: format!("no formatter registered for format '{}'", spec.format),
            })
        })?;
        formatter.parse_final(message, spec).map(Some)
    }
}

/// Merge caller-supplied tool responses into an interrupted history.
///
/// The history must end with a model message carrying tool requests,
/// optionally followed by the partial tool message for the requests that
/// completed before the interrupt. Every outstanding request must be
/// answered exactly once; the merged tool message lists responses in
/// request order.
fn merge_replies(mut messages: Vec<Message>, replies: Vec<ToolResponse>) -> Result<Vec<Message>> {
    let last_role = match messages.last() {
        Some(message) => message.role,
        None => return Err(GenerateError::NothingToResume.into()),
    };

    let (model_idx, mut responses) = match last_role {
        Role::Tool => {
            let idx = messages
                .len()
                .checked_sub(2)
                .filter(|&i| messages[i].role == Role::Model)
                .ok_or(GenerateError::NothingToResume)?;
            let existing = messages[messages.len() - 1]
                .tool_responses()
                .into_iter()
                .cloned()
                .collect();
            (idx, existing)
        }
        Role::Model => (messages.len() - 1, Vec::new()),
        _ => return Err(GenerateError::NothingToResume.into()),
    };

    let requests: Vec<ToolRequest> = messages[model_idx]
        .tool_requests()
        .into_iter()
        .cloned()
        .collect();
    if requests.is_empty() {
        return Err(GenerateError::NothingToResume.into());
    }

    let known: HashSet<&str> = requests.iter().map(|r| r.ref_id.as_str()).collect();
    let mut answered: HashSet<String> =
        responses.iter().map(|r| r.ref_id.clone()).collect();
    for reply in replies {
        if !known.contains(reply.ref_id.as_str()) || !answered.insert(reply.ref_id.clone()) {
            return Err(GenerateError::UnknownToolReply { ref_id: reply.ref_id }.into());
        }
        responses.push(reply);
    }

    let mut ordered = Vec::with_capacity(requests.len());
    for request in &requests {
        match responses.iter().find(|r| r.ref_id == request.ref_id) {
            Some(response) => ordered.push(response.clone()),
            None => {
                return Err(GenerateError::MissingToolReply {
                    ref_id: request.ref_id.clone(),
                    tool: request.name.clone(),
                }
                .into());
            }
        }
    }

    if last_role == Role::Tool {
        messages.pop();
    }
    messages.push(Message::tool(ordered));
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        approval_tool, make_text_response, make_tool_call_response, scripted_model, sum_tool,
    };
    use spindle_core::{ActionMetadata, RegistryError};
    use spindle_telemetry::InMemorySink;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::new())
    }

    #[tokio::test]
    async fn no_tool_requests_is_done_after_one_round() {
        let registry = registry();
        let (model, calls) = scripted_model(vec![make_text_response("Hello!")]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let outcome = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("Hi"),
                ActionRunContext::new(),
            )
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Done(response) => {
                assert_eq!(response.text(), "Hello!");
                assert_eq!(response.rounds, 1);
                // User prompt + final model message.
                assert_eq!(response.messages.len(), 2);
            }
            other => panic!("expected Done, got {other:?}"),
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn add_tool_scenario_takes_two_rounds() {
        let registry = registry();
        let (model, model_calls) = scripted_model(vec![
            make_tool_call_response(
                vec![ToolRequest::new("add", json!({"a": 2, "b": 3})).with_ref("call_1")],
                "Let me add those.",
            ),
            make_text_response("5"),
        ]);
        registry.register(model).unwrap();
        let (add, add_calls) = sum_tool();
        registry.register(add).unwrap();

        let generator = Generator::new(registry);
        let outcome = generator
            .generate(
                GenerateRequest::new("scripted")
                    .with_prompt("What is 2 + 3?")
                    .with_tool("add"),
                ActionRunContext::new(),
            )
            .await
            .unwrap();

        let TurnOutcome::Done(response) = outcome else {
            panic!("expected Done");
        };
        assert_eq!(response.text(), "5");
        assert_eq!(response.rounds, 2);
        assert_eq!(model_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(add_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        // user, model(tool request), tool(response), model(final)
        assert_eq!(response.messages.len(), 4);
        let tool_msg = &response.messages[2];
        assert_eq!(tool_msg.role, Role::Tool);
        let responses = tool_msg.tool_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].ref_id, "call_1");
        assert_eq!(responses[0].output, json!(5));
    }

    #[tokio::test]
    async fn relentless_tool_calls_hit_the_round_limit() {
        let registry = registry();
        let scripted: Vec<_> = (0..3)
            .map(|i| {
                make_tool_call_response(
                    vec![ToolRequest::new("add", json!({"a": i, "b": 1}))],
                    "again",
                )
            })
            .collect();
        let (model, _) = scripted_model(scripted);
        registry.register(model).unwrap();
        let (add, add_calls) = sum_tool();
        registry.register(add).unwrap();

        let generator = Generator::new(registry).with_max_turns(3);
        let err = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("go").with_tool("add"),
                ActionRunContext::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Generate(GenerateError::TurnLimitExceeded { limit: 3 })
        ));
        assert_eq!(add_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn interrupt_keeps_completed_siblings_and_resumes() {
        let registry = registry();
        let (model, _) = scripted_model(vec![
            make_tool_call_response(
                vec![
                    ToolRequest::new("add", json!({"a": 2, "b": 3})).with_ref("call_add"),
                    ToolRequest::new("approve", json!({"amount": 5})).with_ref("call_approve"),
                ],
                "Need a sum and a sign-off.",
            ),
            make_text_response("All settled."),
        ]);
        registry.register(model).unwrap();
        let (add, _) = sum_tool();
        registry.register(add).unwrap();
        registry
            .register(approval_tool(Some(json!({"channel": "email"}))))
            .unwrap();

        let generator = Generator::new(registry);
        let request = GenerateRequest::new("scripted")
            .with_prompt("Add then approve")
            .with_tool("add")
            .with_tool("approve");

        let outcome = generator
            .generate(request.clone(), ActionRunContext::new())
            .await
            .unwrap();

        let TurnOutcome::Interrupted { messages, interrupts } = outcome else {
            panic!("expected Interrupted");
        };
        assert_eq!(interrupts.len(), 1);
        assert_eq!(interrupts[0].request.ref_id, "call_approve");
        assert_eq!(interrupts[0].metadata, Some(json!({"channel": "email"})));

        // The completed sibling's response is already in the history.
        let partial = messages.last().unwrap();
        assert_eq!(partial.role, Role::Tool);
        let responses = partial.tool_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].ref_id, "call_add");

        let outcome = generator
            .resume(
                request.with_messages(messages),
                vec![ToolResponse::new("call_approve", "approve", json!("approved"))],
                ActionRunContext::new(),
            )
            .await
            .unwrap();

        let TurnOutcome::Done(response) = outcome else {
            panic!("expected Done after resume");
        };
        assert_eq!(response.text(), "All settled.");

        // The merged tool message answers both requests, in request order.
        let tool_msg = &response.messages[response.messages.len() - 2];
        let responses = tool_msg.tool_responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].ref_id, "call_add");
        assert_eq!(responses[1].ref_id, "call_approve");
    }

    #[tokio::test]
    async fn interrupt_without_completed_siblings_appends_no_tool_message() {
        let registry = registry();
        let (model, _) = scripted_model(vec![make_tool_call_response(
            vec![ToolRequest::new("approve", json!({})).with_ref("call_1")],
            "",
        )]);
        registry.register(model).unwrap();
        registry.register(approval_tool(None)).unwrap();

        let generator = Generator::new(registry);
        let outcome = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("approve").with_tool("approve"),
                ActionRunContext::new(),
            )
            .await
            .unwrap();

        let TurnOutcome::Interrupted { messages, interrupts } = outcome else {
            panic!("expected Interrupted");
        };
        assert_eq!(interrupts.len(), 1);
        assert_eq!(interrupts[0].metadata, None);
        assert_eq!(messages.last().unwrap().role, Role::Model);
    }

    #[tokio::test]
    async fn concurrent_tools_synthesize_in_request_order() {
        let registry = registry();
        let slow = Action::tool(
            "slow",
            "Slow tool",
            json!({"type": "object"}),
            |_input, _ctx| async move {
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                Ok(ToolOutcome::Completed(json!("slow")))
            },
        );
        let fast = Action::tool(
            "fast",
            "Fast tool",
            json!({"type": "object"}),
            |_input, _ctx| async move { Ok(ToolOutcome::Completed(json!("fast"))) },
        );
        registry.register(slow).unwrap();
        registry.register(fast).unwrap();

        let (model, _) = scripted_model(vec![
            make_tool_call_response(
                vec![
                    ToolRequest::new("slow", json!({})).with_ref("call_slow"),
                    ToolRequest::new("fast", json!({})).with_ref("call_fast"),
                ],
                "",
            ),
            make_text_response("done"),
        ]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let outcome = generator
            .generate(
                GenerateRequest::new("scripted")
                    .with_prompt("race")
                    .with_tool("slow")
                    .with_tool("fast"),
                ActionRunContext::new(),
            )
            .await
            .unwrap();

        let TurnOutcome::Done(response) = outcome else {
            panic!("expected Done");
        };
        let tool_msg = &response.messages[2];
        let responses = tool_msg.tool_responses();
        assert_eq!(responses[0].ref_id, "call_slow");
        assert_eq!(responses[1].ref_id, "call_fast");
    }

    #[tokio::test]
    async fn unknown_requested_tool_is_a_hard_failure() {
        let registry = registry();
        let (model, _) = scripted_model(vec![make_tool_call_response(
            vec![ToolRequest::new("ghost", json!({}))],
            "",
        )]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let err = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("go"),
                ActionRunContext::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registry(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn empty_model_response_is_a_hard_failure() {
        let registry = registry();
        let (model, _) = scripted_model(vec![spindle_core::ModelResponse::new(Message::model(
            vec![],
        ))]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let err = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("hi"),
                ActionRunContext::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Generate(GenerateError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn usage_accumulates_across_rounds() {
        let registry = registry();
        let (model, _) = scripted_model(vec![
            make_tool_call_response(vec![ToolRequest::new("add", json!({"a": 1, "b": 1}))], ""),
            make_text_response("2"),
        ]);
        registry.register(model).unwrap();
        let (add, _) = sum_tool();
        registry.register(add).unwrap();

        let generator = Generator::new(registry);
        let TurnOutcome::Done(response) = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("sum").with_tool("add"),
                ActionRunContext::new(),
            )
            .await
            .unwrap()
        else {
            panic!("expected Done");
        };
        // Each scripted round reports 15 total tokens.
        assert_eq!(response.usage.total_tokens, 30);
        assert_eq!(response.usage.prompt_tokens, 20);
    }

    #[tokio::test]
    async fn json_output_is_parsed_at_done() {
        let registry = registry();
        let (model, _) = scripted_model(vec![make_text_response(r#"{"sum": 5}"#)]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let TurnOutcome::Done(response) = generator
            .generate(
                GenerateRequest::new("scripted")
                    .with_prompt("sum as json")
                    .with_output(OutputSpec::json()),
                ActionRunContext::new(),
            )
            .await
            .unwrap()
        else {
            panic!("expected Done");
        };
        assert_eq!(response.output, Some(json!({"sum": 5})));
    }

    #[tokio::test]
    async fn output_parse_failure_is_final() {
        let registry = registry();
        let (model, _) = scripted_model(vec![make_text_response("not json at all")]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let err = generator
            .generate(
                GenerateRequest::new("scripted")
                    .with_prompt("json please")
                    .with_output(OutputSpec::json()),
                ActionRunContext::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generate(GenerateError::Parse { .. })));
    }

    #[tokio::test]
    async fn tool_failure_is_terminal_not_interrupting() {
        let registry = registry();
        let broken = Action::tool(
            "broken",
            "Always fails",
            json!({"type": "object"}),
            |_input, _ctx| async move {
                Err::<ToolOutcome, _>(Error::Internal("tool exploded".into()))
            },
        );
        registry.register(broken).unwrap();
        let (model, _) = scripted_model(vec![make_tool_call_response(
            vec![ToolRequest::new("broken", json!({}))],
            "",
        )]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let err = generator
            .generate(
                GenerateRequest::new("scripted").with_prompt("go").with_tool("broken"),
                ActionRunContext::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tool/broken"));
    }

    #[test]
    fn generate_sync_from_plain_thread() {
        let registry = registry();
        let (model, _) = scripted_model(vec![make_text_response("offline answer")]);
        registry.register(model).unwrap();

        let generator = Generator::new(registry);
        let outcome = generator
            .generate_sync(
                GenerateRequest::new("scripted").with_prompt("hi"),
                ActionRunContext::new(),
            )
            .unwrap();
        let TurnOutcome::Done(response) = outcome else {
            panic!("expected Done");
        };
        assert_eq!(response.text(), "offline answer");
    }

    #[tokio::test]
    async fn turn_span_is_emitted() {
        let registry = registry();
        let (model, _) = scripted_model(vec![make_text_response("hi")]);
        registry.register(model).unwrap();

        let sink = InMemorySink::new();
        let ctx = ActionRunContext::new().with_span_sink(sink.clone());

        let generator = Generator::new(registry);
        generator
            .generate(GenerateRequest::new("scripted").with_prompt("hi"), ctx)
            .await
            .unwrap();

        let spans = sink.ended();
        let turn: Vec<_> = spans.iter().filter(|s| s.kind == SpanKind::Turn).collect();
        assert_eq!(turn.len(), 1);
        assert_eq!(turn[0].success, Some(true));
        // The model invocation inside the turn got its own span.
        assert!(spans.iter().any(|s| s.kind == SpanKind::Model));
    }

    #[tokio::test]
    async fn streaming_flows_model_chunks_to_caller() {
        let registry = registry();
        let streamy = Action::model("streamy", |_req: ModelRequest, ctx| async move {
            for token in ["para", "keet"] {
                ctx.send_chunk(json!({"text": token})).unwrap();
            }
            Ok(spindle_core::ModelResponse::new(Message::model_text("parakeet")))
        });
        registry.register(streamy).unwrap();

        let generator = Arc::new(Generator::new(registry));
        let flow_generator = Arc::clone(&generator);
        let chat = Action::suspending(
            ActionMetadata::new(ActionKind::Flow, "chat"),
            move |input, ctx| {
                let generator = Arc::clone(&flow_generator);
                async move {
                    let prompt = input["prompt"].as_str().unwrap_or_default().to_string();
                    let outcome = generator
                        .generate(GenerateRequest::new("streamy").with_prompt(prompt), ctx)
                        .await?;
                    match outcome {
                        TurnOutcome::Done(response) => Ok(json!(response.text())),
                        TurnOutcome::Interrupted { .. } => {
                            Err(Error::Internal("unexpected interrupt".into()))
                        }
                    }
                }
            },
        );

        let (mut chunks, response) =
            chat.stream(json!({"prompt": "name a bird"}), ActionRunContext::new());
        let mut seen = Vec::new();
        while let Some(chunk) = chunks.recv().await.unwrap() {
            seen.push(chunk["text"].as_str().unwrap().to_string());
        }
        assert_eq!(seen, vec!["para", "keet"]);
        assert_eq!(response.await.unwrap(), json!("parakeet"));
    }

    // ── merge_replies edge cases ─────────────────────────────────────────

    fn interrupted_history() -> Vec<Message> {
        vec![
            Message::user("go"),
            Message::model(vec![
                spindle_core::Part::ToolRequest(
                    ToolRequest::new("add", json!({})).with_ref("r1"),
                ),
                spindle_core::Part::ToolRequest(
                    ToolRequest::new("approve", json!({})).with_ref("r2"),
                ),
            ]),
            Message::tool(vec![ToolResponse::new("r1", "add", json!(2))]),
        ]
    }

    #[test]
    fn merge_orders_and_replaces_partial_message() {
        let merged = merge_replies(
            interrupted_history(),
            vec![ToolResponse::new("r2", "approve", json!("ok"))],
        )
        .unwrap();

        assert_eq!(merged.len(), 3);
        let responses = merged[2].tool_responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].ref_id, "r1");
        assert_eq!(responses[1].ref_id, "r2");
    }

    #[test]
    fn merge_rejects_missing_reply() {
        let err = merge_replies(interrupted_history(), vec![]).unwrap_err();
        assert!(matches!(
            err,
            Error::Generate(GenerateError::MissingToolReply { ref ref_id, .. }) if ref_id == "r2"
        ));
    }

    #[test]
    fn merge_rejects_unknown_reply() {
        let err = merge_replies(
            interrupted_history(),
            vec![ToolResponse::new("r9", "mystery", json!(null))],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Generate(GenerateError::UnknownToolReply { ref ref_id }) if ref_id == "r9"
        ));
    }

    #[test]
    fn merge_rejects_duplicate_reply() {
        let err = merge_replies(
            interrupted_history(),
            vec![
                ToolResponse::new("r2", "approve", json!("ok")),
                ToolResponse::new("r2", "approve", json!("twice")),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Generate(GenerateError::UnknownToolReply { .. })
        ));
    }

    #[test]
    fn merge_rejects_history_without_requests() {
        let err = merge_replies(vec![Message::user("hi")], vec![]).unwrap_err();
        assert!(matches!(
            err,
            Error::Generate(GenerateError::NothingToResume)
        ));
    }
}
