//! Shared test helpers for orchestrator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use spindle_core::{
    Message, ModelRequest, ModelResponse, Part, Result, ToolOutcome, ToolRequest, Usage,
};
use spindle_runtime::Action;

/// A model action named "scripted" that returns a fixed sequence of
/// responses, one per call, counting calls. Panics if called more times
/// than responses were provided.
pub fn scripted_model(responses: Vec<ModelResponse>) -> (Action, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));

    let counter = Arc::clone(&calls);
    let action = Action::model("scripted", move |_req: ModelRequest, _ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        let next = queue.lock().unwrap().pop_front();
        async move {
            match next {
                Some(response) => Ok(response),
                None => panic!("scripted model ran out of responses"),
            }
        }
    });
    (action, calls)
}

/// A plain text response with fixed usage (10 prompt + 5 completion).
pub fn make_text_response(text: &str) -> ModelResponse {
    ModelResponse::new(Message::model_text(text)).with_usage(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A response carrying tool requests and optional lead-in text.
pub fn make_tool_call_response(requests: Vec<ToolRequest>, text: &str) -> ModelResponse {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(Part::text(text));
    }
    parts.extend(requests.into_iter().map(Part::ToolRequest));
    ModelResponse::new(Message::model(parts)).with_usage(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// An "add" tool summing integer inputs `a` and `b`, counting invocations.
pub fn sum_tool() -> (Action, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let action = Action::tool(
        "add",
        "Adds two numbers",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b"]
        }),
        move |input: serde_json::Value, _ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let a = input["a"].as_i64().unwrap_or(0);
                let b = input["b"].as_i64().unwrap_or(0);
                Ok::<_, spindle_core::Error>(ToolOutcome::Completed(json!(a + b)))
            }
        },
    );
    (action, calls)
}

/// An "approve" tool that always suspends the turn with the given metadata.
pub fn approval_tool(metadata: Option<serde_json::Value>) -> Action {
    Action::tool(
        "approve",
        "Asks a human for approval",
        json!({"type": "object"}),
        move |_input: serde_json::Value, _ctx| {
            let metadata = metadata.clone();
            async move { Result::Ok(ToolOutcome::Interrupted(metadata)) }
        },
    )
}
