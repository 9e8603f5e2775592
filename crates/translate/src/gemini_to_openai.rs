//! Builds a complete OpenAI `chat.completion` response from an accumulated
//! stream outcome.

use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::collect::StreamOutcome;

/// A finished stream outcome paired with the response identity fields.
///
/// Implements `From` → [`Value`] to produce the `chat.completion` object.
pub struct ChatCompletion<'a> {
    pub outcome: &'a StreamOutcome,
    pub model: &'a str,
    pub id: &'a str,
}

impl From<ChatCompletion<'_>> for Value {
    fn from(response: ChatCompletion<'_>) -> Self {
        let outcome = response.outcome;

        let content: Value = if outcome.content.is_empty() && !outcome.tool_calls.is_empty() {
            Value::Null
        } else {
            Value::String(outcome.content.clone())
        };

        let mut message = json!({
            "role": "assistant",
            "content": content,
        });

        if !outcome.tool_calls.is_empty() {
            let calls: Vec<Value> = outcome
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": call.arguments},
                    })
                })
                .collect();
            message["tool_calls"] = Value::Array(calls);
        }

        json!({
            "id": response.id,
            "object": "chat.completion",
            "created": unix_now(),
            "model": response.model,
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": outcome.finish_reason.as_str(),
            }],
            "usage": {
                "prompt_tokens": outcome.usage.prompt_tokens,
                "completion_tokens": outcome.usage.completion_tokens,
                "total_tokens": outcome.usage.total(),
            }
        })
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
