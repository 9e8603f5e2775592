//! Builds a complete Responses API `response` object from an accumulated
//! stream outcome.

use serde_json::{Value, json};

use crate::collect::StreamOutcome;
use crate::gemini_to_openai::unix_now;

/// A finished stream outcome paired with the response identity fields.
///
/// Implements `From` → [`Value`] to produce the Responses API `response`
/// object with its `output` item array.
pub struct ResponsesResponse<'a> {
    pub outcome: &'a StreamOutcome,
    pub model: &'a str,
    pub id: &'a str,
}

impl From<ResponsesResponse<'_>> for Value {
    fn from(response: ResponsesResponse<'_>) -> Self {
        json!({
            "id": response.id,
            "object": "response",
            "created_at": unix_now(),
            "status": "completed",
            "model": response.model,
            "output": output_items(response.outcome, response.id),
            "usage": {
                "input_tokens": response.outcome.usage.prompt_tokens,
                "output_tokens": response.outcome.usage.completion_tokens,
                "total_tokens": response.outcome.usage.total(),
            }
        })
    }
}

/// The `output` array: one message item when text was produced, then one
/// `function_call` item per tool call.
pub fn output_items(outcome: &StreamOutcome, response_id: &str) -> Vec<Value> {
    let mut items: Vec<Value> = Vec::new();

    if !outcome.content.is_empty() {
        items.push(json!({
            "type": "message",
            "id": format!("msg_{response_id}"),
            "status": "completed",
            "role": "assistant",
            "content": [{
                "type": "output_text",
                "text": outcome.content,
                "annotations": [],
            }],
        }));
    }

    for (position, call) in outcome.tool_calls.iter().enumerate() {
        items.push(json!({
            "type": "function_call",
            "id": format!("fc_{response_id}_{position}"),
            "status": "completed",
            "call_id": call.id,
            "name": call.name,
            "arguments": call.arguments,
        }));
    }

    items
}
