//! Translates OpenAI chat completion requests into the Gemini
//! `generateContent` request body.

use gembridge_types::{BridgeError, RequestTranslator, traits::Result};
use serde_json::{Value, json};

use crate::schema::normalize_schema;
use crate::thinking::effort_budget;

/// Translator from OpenAI chat completion request format to the Gemini
/// request body (`contents`, `systemInstruction`, `tools`, `toolConfig`,
/// `generationConfig`).
pub struct OpenAiToGemini;

impl RequestTranslator for OpenAiToGemini {
    /// System and developer messages are extracted into `systemInstruction`,
    /// `assistant` maps to role `model`, tool calls and tool results become
    /// `functionCall` / `functionResponse` parts, and tool parameter schemas
    /// are reduced to the Gemini-accepted subset.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] if `messages` is missing.
    fn translate_request(&self, req: Value) -> Result<Value> {
        let messages = req
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| BridgeError::InvalidRequest("messages is required".into()))?;

        let mut system_text: Vec<String> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in messages {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
            match role {
                "system" | "developer" => {
                    if let Some(text) = text_of(message.get("content")) {
                        system_text.push(text);
                    }
                }
                "assistant" => contents.push(assistant_turn(message)),
                "tool" => contents.push(tool_turn(message, messages)),
                _ => contents.push(user_turn(message)),
            }
        }

        let mut generation_config = json!({});
        if let Some(max_tokens) = req
            .get("max_tokens")
            .or_else(|| req.get("max_completion_tokens"))
            .and_then(Value::as_u64)
        {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(temp) = req.get("temperature")
            && !temp.is_null()
        {
            generation_config["temperature"] = temp.clone();
        }
        if let Some(effort) = req
            .get("reasoning_effort")
            .or_else(|| req.pointer("/reasoning/effort"))
            .and_then(Value::as_str)
            && let Some(budget) = effort_budget(effort)
        {
            generation_config["thinkingConfig"] = json!({
                "thinkingBudget": budget,
                "includeThoughts": true,
            });
        }

        let mut out = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if !system_text.is_empty() {
            out["systemInstruction"] = json!({"parts": [{"text": system_text.join("\n")}]});
        }

        if let Some(tools) = req.get("tools").and_then(Value::as_array) {
            let declarations = function_declarations(tools);
            if !declarations.is_empty() {
                out["tools"] = json!([{"functionDeclarations": declarations}]);
            }
        }

        if let Some(choice) = req.get("tool_choice") {
            out["toolConfig"] = tool_config(choice);
        }

        Ok(out)
    }
}

/// OpenAI `tools` entries → Gemini function declarations. Accepts both the
/// chat shape (`{"function": {...}}`) and the flat Responses shape.
pub(crate) fn function_declarations(tools: &[Value]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| {
            let func = tool.get("function").unwrap_or(tool);
            let name = func.get("name").and_then(Value::as_str)?;
            let mut decl = json!({"name": name});
            if let Some(desc) = func.get("description") {
                decl["description"] = desc.clone();
            }
            if let Some(params) = func.get("parameters")
                && !params.is_null()
            {
                decl["parameters"] = normalize_schema(params);
            }
            Some(decl)
        })
        .collect()
}

/// OpenAI `tool_choice` → Gemini `toolConfig`.
pub(crate) fn tool_config(choice: &Value) -> Value {
    match choice.as_str() {
        Some("none") => json!({"functionCallingConfig": {"mode": "NONE"}}),
        Some("auto") => json!({"functionCallingConfig": {"mode": "AUTO"}}),
        Some("required") | Some("any") => json!({"functionCallingConfig": {"mode": "ANY"}}),
        _ => {
            if let Some(name) = choice.pointer("/function/name").and_then(Value::as_str) {
                json!({"functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": [name]}})
            } else {
                json!({"functionCallingConfig": {"mode": "AUTO"}})
            }
        }
    }
}

/// Concatenated text of a message content field (string or text-part array).
fn text_of(content: Option<&Value>) -> Option<String> {
    match content {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(parts)) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn assistant_turn(message: &Value) -> Value {
    let mut parts: Vec<Value> = Vec::new();

    if let Some(text) = message.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        parts.push(json!({"text": text}));
    }

    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in tool_calls {
            let name = call
                .pointer("/function/name")
                .and_then(Value::as_str)
                .unwrap_or("");
            let args_str = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            let args: Value = serde_json::from_str(args_str).unwrap_or_else(|_| json!({}));
            parts.push(json!({"functionCall": {"name": name, "args": args}}));
        }
    }

    if parts.is_empty() {
        parts.push(json!({"text": "."}));
    }

    json!({"role": "model", "parts": parts})
}

fn tool_turn(message: &Value, all_messages: &[Value]) -> Value {
    let call_id = message
        .get("tool_call_id")
        .and_then(Value::as_str)
        .unwrap_or("");
    let name = lookup_tool_name(all_messages, call_id)
        .or_else(|| {
            message
                .get("name")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| call_id.to_string());

    let result = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    };

    json!({
        "role": "user",
        "parts": [{"functionResponse": {"name": name, "response": {"result": result}}}]
    })
}

/// Find the function name that produced `call_id` in an earlier assistant
/// turn's `tool_calls`.
fn lookup_tool_name(messages: &[Value], call_id: &str) -> Option<String> {
    for message in messages {
        let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
            continue;
        };
        for call in calls {
            if call.get("id").and_then(Value::as_str) == Some(call_id) {
                return call
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .map(String::from);
            }
        }
    }
    None
}

fn user_turn(message: &Value) -> Value {
    let parts = match message.get("content") {
        Some(Value::String(s)) => vec![json!({"text": s})],
        Some(Value::Array(items)) => {
            let multi = items.len() > 1;
            items
                .iter()
                .filter_map(|item| user_part(item, multi))
                .collect()
        }
        _ => Vec::new(),
    };

    let parts = if parts.is_empty() {
        vec![json!({"text": "."})]
    } else {
        parts
    };

    json!({"role": "user", "parts": parts})
}

fn user_part(item: &Value, multi_part: bool) -> Option<Value> {
    match item.get("type").and_then(Value::as_str) {
        Some("text") | None => {
            let text = item.get("text").and_then(Value::as_str)?;
            Some(json!({"text": terminated(text, multi_part)}))
        }
        Some("image_url") => {
            let url = item.pointer("/image_url/url").and_then(Value::as_str)?;
            let (mime, data) = parse_data_url(url)?;
            Some(json!({"inlineData": {"mimeType": mime, "data": data}}))
        }
        _ => None,
    }
}

/// Gemini merges adjacent text parts without a separator; terminating each
/// part of a multi-part turn with `\n` keeps the concatenation legible.
fn terminated(text: &str, multi_part: bool) -> String {
    if multi_part && !text.ends_with('\n') {
        format!("{text}\n")
    } else {
        text.to_string()
    }
}

/// Parse a `data:<mime>;base64,<body>` URL. Anything else is dropped.
pub(crate) fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    Some((mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_contents() {
        let req = json!({"messages": [{"role": "user", "content": "Hello"}]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["contents"][0]["role"], "user");
        assert_eq!(out["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_missing_messages_is_invalid() {
        let err = OpenAiToGemini.translate_request(json!({})).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));
    }

    #[test]
    fn test_assistant_becomes_model() {
        let req = json!({"messages": [
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": "Hello!"}
        ]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["contents"][1]["role"], "model");
    }

    #[test]
    fn test_system_and_developer_to_instruction() {
        let req = json!({"messages": [
            {"role": "system", "content": "Be concise."},
            {"role": "developer", "content": "Use metric units."},
            {"role": "user", "content": "Hi"}
        ]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(
            out["systemInstruction"]["parts"][0]["text"],
            "Be concise.\nUse metric units."
        );
        assert_eq!(out["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_no_system_no_instruction_field() {
        let req = json!({"messages": [{"role": "user", "content": "hi"}]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert!(out.get("systemInstruction").is_none());
    }

    #[test]
    fn test_multipart_text_newline_terminated() {
        let req = json!({"messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second\n"}
            ]
        }]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["contents"][0]["parts"][0]["text"], "first\n");
        assert_eq!(out["contents"][0]["parts"][1]["text"], "second\n");
    }

    #[test]
    fn test_single_part_text_not_terminated() {
        let req = json!({"messages": [{
            "role": "user",
            "content": [{"type": "text", "text": "only"}]
        }]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["contents"][0]["parts"][0]["text"], "only");
    }

    #[test]
    fn test_data_url_image_to_inline_data() {
        let req = json!({"messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,aWJtZw=="}}
            ]
        }]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        let img = &out["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(img["mimeType"], "image/png");
        assert_eq!(img["data"], "aWJtZw==");
    }

    #[test]
    fn test_non_data_url_image_dropped() {
        let req = json!({"messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "look"},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
            ]
        }]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_turn_padded_with_dot() {
        let req = json!({"messages": [{"role": "user", "content": []}]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["contents"][0]["parts"][0]["text"], ".");
    }

    #[test]
    fn test_tool_calls_to_function_call_parts() {
        let req = json!({"messages": [
            {"role": "user", "content": "weather?"},
            {"role": "assistant", "content": null, "tool_calls": [{
                "id": "call_123",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"NYC\"}"}
            }]}
        ]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        let fc = &out["contents"][1]["parts"][0]["functionCall"];
        assert_eq!(fc["name"], "get_weather");
        assert_eq!(fc["args"]["city"], "NYC");
    }

    #[test]
    fn test_tool_result_name_looked_up_by_call_id() {
        let req = json!({"messages": [
            {"role": "user", "content": "weather?"},
            {"role": "assistant", "content": null, "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{}"}
            }]},
            {"role": "tool", "tool_call_id": "call_abc", "content": "72F"}
        ]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        let fr = &out["contents"][2]["parts"][0]["functionResponse"];
        assert_eq!(fr["name"], "get_weather");
        assert_eq!(fr["response"]["result"], "72F");
    }

    #[test]
    fn test_tool_result_non_string_stringified() {
        let req = json!({"messages": [
            {"role": "assistant", "tool_calls": [{
                "id": "call_1", "type": "function",
                "function": {"name": "lookup", "arguments": "{}"}
            }]},
            {"role": "tool", "tool_call_id": "call_1", "content": {"temp": 72}}
        ]});
        let out = OpenAiToGemini.translate_request(req).unwrap();
        let fr = &out["contents"][1]["parts"][0]["functionResponse"];
        assert_eq!(fr["response"]["result"], "{\"temp\":72}");
    }

    #[test]
    fn test_tools_normalized() {
        let req = json!({
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"type": "function", "function": {
                "name": "pick",
                "description": "Pick one",
                "parameters": {
                    "type": "object",
                    "$schema": "draft-07",
                    "properties": {"choice": {"oneOf": [{"const": "a"}, {"const": "b"}]}}
                }
            }}]
        });
        let out = OpenAiToGemini.translate_request(req).unwrap();
        let decl = &out["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "pick");
        assert!(decl["parameters"].get("$schema").is_none());
        assert_eq!(
            decl["parameters"]["properties"]["choice"],
            json!({"type": "string", "enum": ["a", "b"]})
        );
    }

    #[test]
    fn test_tool_choice_variants() {
        let base = json!([{"role": "user", "content": "hi"}]);
        for (choice, mode) in [
            (json!("none"), "NONE"),
            (json!("auto"), "AUTO"),
            (json!("required"), "ANY"),
            (json!("any"), "ANY"),
        ] {
            let req = json!({"messages": base.clone(), "tool_choice": choice});
            let out = OpenAiToGemini.translate_request(req).unwrap();
            assert_eq!(out["toolConfig"]["functionCallingConfig"]["mode"], mode);
        }

        let req = json!({
            "messages": base,
            "tool_choice": {"type": "function", "function": {"name": "get_weather"}}
        });
        let out = OpenAiToGemini.translate_request(req).unwrap();
        let config = &out["toolConfig"]["functionCallingConfig"];
        assert_eq!(config["mode"], "ANY");
        assert_eq!(config["allowedFunctionNames"][0], "get_weather");
    }

    #[test]
    fn test_generation_config() {
        let req = json!({
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 512,
            "temperature": 0.4
        });
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(out["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(out["generationConfig"]["temperature"], 0.4);
    }

    #[test]
    fn test_reasoning_effort_to_thinking_config() {
        for (effort, budget) in [("low", 1024), ("medium", 8192), ("high", 24_576)] {
            let req = json!({
                "messages": [{"role": "user", "content": "hi"}],
                "reasoning_effort": effort
            });
            let out = OpenAiToGemini.translate_request(req).unwrap();
            let tc = &out["generationConfig"]["thinkingConfig"];
            assert_eq!(tc["thinkingBudget"], budget);
            assert_eq!(tc["includeThoughts"], true);
        }
    }

    #[test]
    fn test_reasoning_object_effort() {
        let req = json!({
            "messages": [{"role": "user", "content": "hi"}],
            "reasoning": {"effort": "medium"}
        });
        let out = OpenAiToGemini.translate_request(req).unwrap();
        assert_eq!(
            out["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            8192
        );
    }

    #[test]
    fn test_parse_data_url() {
        assert_eq!(
            parse_data_url("data:image/jpeg;base64,abc"),
            Some(("image/jpeg", "abc"))
        );
        assert!(parse_data_url("https://x/y.png").is_none());
        assert!(parse_data_url("data:image/png,notbase64").is_none());
    }
}
