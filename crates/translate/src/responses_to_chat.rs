//! Adapts OpenAI Responses API requests into the chat-completions shape so
//! they can flow through [`crate::OpenAiToGemini`].
//!
//! Adjacent `function_call` input items are grouped into a single assistant
//! message with aggregated `tool_calls`; `function_call_output` items become
//! distinct `tool` messages keyed by `call_id`.

use gembridge_types::{BridgeError, traits::Result};
use serde_json::{Value, json};

/// Convert a Responses API request body into a chat-completions body.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] if `input` is missing.
pub fn responses_to_chat(req: &Value) -> Result<Value> {
    let input = req
        .get("input")
        .ok_or_else(|| BridgeError::InvalidRequest("input is required".into()))?;

    let mut messages: Vec<Value> = Vec::new();

    if let Some(instructions) = req.get("instructions").and_then(Value::as_str)
        && !instructions.is_empty()
    {
        messages.push(json!({"role": "system", "content": instructions}));
    }

    match input {
        Value::String(text) => messages.push(json!({"role": "user", "content": text})),
        Value::Array(items) => {
            let mut pending_calls: Vec<Value> = Vec::new();
            for item in items {
                match item.get("type").and_then(Value::as_str) {
                    Some("function_call") => {
                        pending_calls.push(json!({
                            "id": item.get("call_id").cloned().unwrap_or(Value::Null),
                            "type": "function",
                            "function": {
                                "name": item.get("name").cloned().unwrap_or(Value::Null),
                                "arguments": item
                                    .get("arguments")
                                    .cloned()
                                    .unwrap_or_else(|| json!("{}")),
                            }
                        }));
                    }
                    Some("function_call_output") => {
                        flush_calls(&mut pending_calls, &mut messages);
                        messages.push(json!({
                            "role": "tool",
                            "tool_call_id": item.get("call_id").cloned().unwrap_or(Value::Null),
                            "content": output_text(item.get("output")),
                        }));
                    }
                    _ => {
                        flush_calls(&mut pending_calls, &mut messages);
                        messages.push(message_item(item));
                    }
                }
            }
            flush_calls(&mut pending_calls, &mut messages);
        }
        _ => return Err(BridgeError::InvalidRequest("input must be a string or array".into())),
    }

    let mut out = json!({"messages": messages});
    if let Some(model) = req.get("model") {
        out["model"] = model.clone();
    }
    if let Some(temp) = req.get("temperature") {
        out["temperature"] = temp.clone();
    }
    if let Some(max_tokens) = req.get("max_output_tokens") {
        out["max_tokens"] = max_tokens.clone();
    }
    if let Some(effort) = req.pointer("/reasoning/effort") {
        out["reasoning_effort"] = effort.clone();
    }
    // Responses tools are flat; OpenAiToGemini accepts both shapes.
    if let Some(tools) = req.get("tools") {
        out["tools"] = tools.clone();
    }
    if let Some(choice) = req.get("tool_choice") {
        out["tool_choice"] = choice.clone();
    }

    Ok(out)
}

/// Group the buffered `function_call` items into one assistant message.
fn flush_calls(pending: &mut Vec<Value>, messages: &mut Vec<Value>) {
    if pending.is_empty() {
        return;
    }
    messages.push(json!({
        "role": "assistant",
        "content": Value::Null,
        "tool_calls": std::mem::take(pending),
    }));
}

/// A plain `message` (or untyped) input item → chat message.
fn message_item(item: &Value) -> Value {
    let role = item.get("role").and_then(Value::as_str).unwrap_or("user");
    let content = match item.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    json!({"role": role, "content": content})
}

fn output_text(output: Option<&Value>) -> String {
    match output {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}
