//! Translates Anthropic Messages API requests into the Gemini
//! `generateContent` request body.
//!
//! Thinking blocks from prior assistant turns are dropped when rebuilding
//! history; to keep Gemini's validator satisfied, every echoed `tool_use`
//! part carries a placeholder thought signature instead.

use gembridge_types::{BridgeError, RequestTranslator, traits::Result};
use serde_json::{Value, json};

use crate::openai_to_gemini::parse_data_url;
use crate::schema::normalize_schema;
use crate::thinking::effort_budget;

/// Placeholder signature attached to echoed tool_use parts whose original
/// thinking blocks were dropped from the rebuilt history.
const SKIP_SIGNATURE: &str = "skip_thought_signature_validator";

/// System hint appended when tools are present; suppresses a validator
/// quirk for thinking models that interleave thoughts with tool calls.
const INTERLEAVED_THINKING_HINT: &str =
    "Interleaved thinking is enabled: reasoning may occur between tool calls \
     and after tool results.";

/// Translator from Anthropic Messages request format to the Gemini request
/// body.
pub struct AnthropicToGemini;

impl RequestTranslator for AnthropicToGemini {
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] if `max_tokens` or
    /// `messages` is missing.
    fn translate_request(&self, req: Value) -> Result<Value> {
        let max_tokens = req
            .get("max_tokens")
            .and_then(Value::as_u64)
            .ok_or_else(|| BridgeError::InvalidRequest("max_tokens is required".into()))?;
        let messages = req
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| BridgeError::InvalidRequest("messages is required".into()))?;

        let mut system_text = system_of(req.get("system"));

        let contents: Vec<Value> = messages
            .iter()
            .map(|message| {
                let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
                if role == "assistant" {
                    assistant_turn(message)
                } else {
                    user_turn(message, messages)
                }
            })
            .collect();

        let mut generation_config = json!({"maxOutputTokens": max_tokens});
        if let Some(temp) = req.get("temperature")
            && !temp.is_null()
        {
            generation_config["temperature"] = temp.clone();
        }
        if let Some(thinking_config) = thinking_of(&req) {
            generation_config["thinkingConfig"] = thinking_config;
        }

        let mut out = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if let Some(tools) = req.get("tools").and_then(Value::as_array)
            && !tools.is_empty()
        {
            let declarations: Vec<Value> = tools.iter().filter_map(tool_declaration).collect();
            if !declarations.is_empty() {
                out["tools"] = json!([{"functionDeclarations": declarations}]);
            }
            if !system_text.is_empty() {
                system_text.push('\n');
            }
            system_text.push_str(INTERLEAVED_THINKING_HINT);
        }

        if !system_text.is_empty() {
            out["systemInstruction"] = json!({"parts": [{"text": system_text}]});
        }

        if let Some(choice) = req.get("tool_choice") {
            out["toolConfig"] = tool_config(choice);
        }

        Ok(out)
    }
}

/// Anthropic `system` is either a string or an array of text blocks.
fn system_of(system: Option<&Value>) -> String {
    match system {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Anthropic `thinking: {type: "enabled", budget_tokens}` or a
/// `reasoning_effort` extension field → Gemini thinking config.
fn thinking_of(req: &Value) -> Option<Value> {
    if req.pointer("/thinking/type").and_then(Value::as_str) == Some("enabled") {
        let budget = req
            .pointer("/thinking/budget_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(8192);
        return Some(json!({"thinkingBudget": budget, "includeThoughts": true}));
    }
    let effort = req.get("reasoning_effort").and_then(Value::as_str)?;
    effort_budget(effort).map(|budget| json!({"thinkingBudget": budget, "includeThoughts": true}))
}

fn tool_declaration(tool: &Value) -> Option<Value> {
    let name = tool.get("name").and_then(Value::as_str)?;
    let mut decl = json!({"name": name});
    if let Some(desc) = tool.get("description") {
        decl["description"] = desc.clone();
    }
    if let Some(schema) = tool.get("input_schema")
        && !schema.is_null()
    {
        decl["parameters"] = normalize_schema(schema);
    }
    Some(decl)
}

/// Anthropic `tool_choice` objects → Gemini `toolConfig`.
fn tool_config(choice: &Value) -> Value {
    match choice.get("type").and_then(Value::as_str) {
        Some("none") => json!({"functionCallingConfig": {"mode": "NONE"}}),
        Some("any") => json!({"functionCallingConfig": {"mode": "ANY"}}),
        Some("tool") => {
            if let Some(name) = choice.get("name").and_then(Value::as_str) {
                json!({"functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": [name]}})
            } else {
                json!({"functionCallingConfig": {"mode": "ANY"}})
            }
        }
        _ => json!({"functionCallingConfig": {"mode": "AUTO"}}),
    }
}

fn assistant_turn(message: &Value) -> Value {
    let mut parts: Vec<Value> = Vec::new();

    match message.get("content") {
        Some(Value::String(s)) => {
            if !s.is_empty() {
                parts.push(json!({"text": s}));
            }
        }
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(json!({"text": text}));
                        }
                    }
                    Some("tool_use") => {
                        let name = block.get("name").and_then(Value::as_str).unwrap_or("");
                        let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                        parts.push(json!({
                            "functionCall": {"name": name, "args": input},
                            "thoughtSignature": SKIP_SIGNATURE,
                        }));
                    }
                    // thinking / redacted_thinking blocks are not replayed
                    _ => {}
                }
            }
        }
        _ => {}
    }

    if parts.is_empty() {
        parts.push(json!({"text": "."}));
    }

    json!({"role": "model", "parts": parts})
}

fn user_turn(message: &Value, all_messages: &[Value]) -> Value {
    let mut parts: Vec<Value> = Vec::new();

    match message.get("content") {
        Some(Value::String(s)) => parts.push(json!({"text": s})),
        Some(Value::Array(blocks)) => {
            let multi = blocks.len() > 1;
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            parts.push(json!({"text": terminated(text, multi)}));
                        }
                    }
                    Some("image") => {
                        if let Some(part) = image_part(block) {
                            parts.push(part);
                        }
                    }
                    Some("tool_result") => {
                        parts.push(tool_result_part(block, all_messages));
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    if parts.is_empty() {
        parts.push(json!({"text": "."}));
    }

    json!({"role": "user", "parts": parts})
}

fn terminated(text: &str, multi_part: bool) -> String {
    if multi_part && !text.ends_with('\n') {
        format!("{text}\n")
    } else {
        text.to_string()
    }
}

/// Anthropic image blocks: native base64 sources and data URLs both map to
/// `inlineData`; anything else is dropped.
fn image_part(block: &Value) -> Option<Value> {
    let source = block.get("source")?;
    match source.get("type").and_then(Value::as_str) {
        Some("base64") => {
            let mime = source.get("media_type").and_then(Value::as_str)?;
            let data = source.get("data").and_then(Value::as_str)?;
            Some(json!({"inlineData": {"mimeType": mime, "data": data}}))
        }
        Some("url") => {
            let url = source.get("url").and_then(Value::as_str)?;
            let (mime, data) = parse_data_url(url)?;
            Some(json!({"inlineData": {"mimeType": mime, "data": data}}))
        }
        _ => None,
    }
}

fn tool_result_part(block: &Value, all_messages: &[Value]) -> Value {
    let tool_use_id = block
        .get("tool_use_id")
        .and_then(Value::as_str)
        .unwrap_or("");
    let name = lookup_tool_name(all_messages, tool_use_id).unwrap_or_else(|| tool_use_id.into());

    let result = match block.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "Success".to_string(),
    };
    let result = if result.is_empty() {
        "Success".to_string()
    } else {
        result
    };

    json!({"functionResponse": {"name": name, "response": {"result": result}}})
}

/// Find the tool name for `tool_use_id` in an earlier assistant turn's
/// `tool_use` blocks.
fn lookup_tool_name(messages: &[Value], tool_use_id: &str) -> Option<String> {
    for message in messages {
        let Some(blocks) = message.get("content").and_then(Value::as_array) else {
            continue;
        };
        for block in blocks {
            if block.get("type").and_then(Value::as_str) == Some("tool_use")
                && block.get("id").and_then(Value::as_str) == Some(tool_use_id)
            {
                return block.get("name").and_then(Value::as_str).map(String::from);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(messages: Value) -> Value {
        json!({"model": "claude-3-5-sonnet-20241022", "max_tokens": 1024, "messages": messages})
    }

    #[test]
    fn test_missing_max_tokens_rejected() {
        let req = json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]});
        let err = AnthropicToGemini.translate_request(req).unwrap_err();
        match err {
            BridgeError::InvalidRequest(msg) => assert_eq!(msg, "max_tokens is required"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_basic_translation() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([{"role": "user", "content": "Hello"}])))
            .unwrap();
        assert_eq!(out["contents"][0]["role"], "user");
        assert_eq!(out["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(out["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_system_string() {
        let mut req = minimal(json!([{"role": "user", "content": "hi"}]));
        req["system"] = json!("Be brief.");
        let out = AnthropicToGemini.translate_request(req).unwrap();
        assert_eq!(out["systemInstruction"]["parts"][0]["text"], "Be brief.");
    }

    #[test]
    fn test_system_blocks() {
        let mut req = minimal(json!([{"role": "user", "content": "hi"}]));
        req["system"] = json!([{"type": "text", "text": "One."}, {"type": "text", "text": "Two."}]);
        let out = AnthropicToGemini.translate_request(req).unwrap();
        assert_eq!(out["systemInstruction"]["parts"][0]["text"], "One.\nTwo.");
    }

    #[test]
    fn test_tools_append_interleaved_hint() {
        let mut req = minimal(json!([{"role": "user", "content": "hi"}]));
        req["system"] = json!("Base.");
        req["tools"] = json!([{
            "name": "get_weather",
            "description": "Weather lookup",
            "input_schema": {"type": "object", "properties": {"city": {"type": "string"}}}
        }]);
        let out = AnthropicToGemini.translate_request(req).unwrap();
        let system = out["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(system.starts_with("Base.\n"));
        assert!(system.contains("Interleaved thinking is enabled"));
        let decl = &out["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "get_weather");
        assert_eq!(decl["parameters"]["properties"]["city"]["type"], "string");
    }

    #[test]
    fn test_thinking_blocks_dropped_and_tool_use_gets_skip_signature() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([
                {"role": "user", "content": "weather?"},
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "let me check", "signature": "sig"},
                    {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"}}
                ]}
            ])))
            .unwrap();
        let parts = out["contents"][1]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1, "thinking block must not be replayed");
        assert_eq!(parts[0]["functionCall"]["name"], "get_weather");
        assert_eq!(parts[0]["thoughtSignature"], SKIP_SIGNATURE);
    }

    #[test]
    fn test_assistant_only_thinking_padded_with_dot() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "hmm", "signature": "s"}
                ]}
            ])))
            .unwrap();
        assert_eq!(out["contents"][1]["parts"][0]["text"], ".");
    }

    #[test]
    fn test_tool_result_string() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "toolu_9", "name": "get_time", "input": {}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_9", "content": "12:30"}
                ]}
            ])))
            .unwrap();
        let fr = &out["contents"][1]["parts"][0]["functionResponse"];
        assert_eq!(fr["name"], "get_time");
        assert_eq!(fr["response"]["result"], "12:30");
    }

    #[test]
    fn test_tool_result_array_concatenated() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "t1", "name": "read", "input": {}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": [
                        {"type": "text", "text": "line one"},
                        {"type": "text", "text": "line two"}
                    ]}
                ]}
            ])))
            .unwrap();
        let fr = &out["contents"][1]["parts"][0]["functionResponse"];
        assert_eq!(fr["response"]["result"], "line one\nline two");
    }

    #[test]
    fn test_tool_result_empty_is_success() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": []}
                ]}
            ])))
            .unwrap();
        let fr = &out["contents"][0]["parts"][0]["functionResponse"];
        assert_eq!(fr["response"]["result"], "Success");
    }

    #[test]
    fn test_image_base64_source() {
        let out = AnthropicToGemini
            .translate_request(minimal(json!([
                {"role": "user", "content": [
                    {"type": "text", "text": "see"},
                    {"type": "image", "source": {
                        "type": "base64", "media_type": "image/jpeg", "data": "qq=="
                    }}
                ]}
            ])))
            .unwrap();
        let img = &out["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(img["mimeType"], "image/jpeg");
        assert_eq!(img["data"], "qq==");
    }

    #[test]
    fn test_thinking_enabled_mapped() {
        let mut req = minimal(json!([{"role": "user", "content": "hi"}]));
        req["thinking"] = json!({"type": "enabled", "budget_tokens": 2048});
        let out = AnthropicToGemini.translate_request(req).unwrap();
        let tc = &out["generationConfig"]["thinkingConfig"];
        assert_eq!(tc["thinkingBudget"], 2048);
        assert_eq!(tc["includeThoughts"], true);
    }

    #[test]
    fn test_tool_choice_variants() {
        for (choice, mode) in [
            (json!({"type": "auto"}), "AUTO"),
            (json!({"type": "any"}), "ANY"),
            (json!({"type": "none"}), "NONE"),
        ] {
            let mut req = minimal(json!([{"role": "user", "content": "hi"}]));
            req["tool_choice"] = choice;
            let out = AnthropicToGemini.translate_request(req).unwrap();
            assert_eq!(out["toolConfig"]["functionCallingConfig"]["mode"], mode);
        }

        let mut req = minimal(json!([{"role": "user", "content": "hi"}]));
        req["tool_choice"] = json!({"type": "tool", "name": "get_weather"});
        let out = AnthropicToGemini.translate_request(req).unwrap();
        let config = &out["toolConfig"]["functionCallingConfig"];
        assert_eq!(config["mode"], "ANY");
        assert_eq!(config["allowedFunctionNames"][0], "get_weather");
    }
}
