//! Builds a complete Anthropic `message` response from an accumulated
//! stream outcome.

use serde_json::{Value, json};

use crate::collect::StreamOutcome;

/// Placeholder text when a response carried no visible content at all.
pub const EMPTY_RESPONSE_TEXT: &str = "[No response received - please try again]";

/// A finished stream outcome paired with the response identity fields.
///
/// Implements `From` → [`Value`] to produce the Anthropic `message` object.
pub struct AnthropicMessage<'a> {
    pub outcome: &'a StreamOutcome,
    pub model: &'a str,
    pub id: &'a str,
}

impl From<AnthropicMessage<'_>> for Value {
    fn from(response: AnthropicMessage<'_>) -> Self {
        let outcome = response.outcome;
        let mut content: Vec<Value> = Vec::new();

        if !outcome.content.is_empty() {
            content.push(json!({"type": "text", "text": outcome.content}));
        }

        for call in &outcome.tool_calls {
            let input: Value =
                serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
            content.push(json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": input,
            }));
        }

        if content.is_empty() {
            content.push(json!({"type": "text", "text": EMPTY_RESPONSE_TEXT}));
        }

        json!({
            "id": response.id,
            "type": "message",
            "role": "assistant",
            "model": response.model,
            "content": content,
            "stop_reason": outcome.finish_reason.as_anthropic(),
            "stop_sequence": Value::Null,
            "usage": {
                "input_tokens": outcome.usage.prompt_tokens,
                "output_tokens": outcome.usage.completion_tokens,
            }
        })
    }
}
