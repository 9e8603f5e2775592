//! OpenAI Chat Completions SSE re-emitter.
//!
//! Each normalized chunk becomes one `chat.completion.chunk` data event
//! sharing the request's chat id; the handler closes the stream with the
//! `data: [DONE]` sentinel. Tool-call deltas pass through verbatim,
//! including their thought-signature bookkeeping field.

use gembridge_types::StreamChunk;
use serde_json::{Map, Value, json};

use super::SseEvent;

/// Stateless per-request emitter for the chat-completions dialect.
pub struct OpenAiStream {
    id: String,
    model: String,
    created: u64,
}

impl OpenAiStream {
    #[must_use]
    pub fn new(id: String, model: String) -> Self {
        Self {
            id,
            model,
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    /// Serialize one chunk; internal thinking lifecycle markers produce no
    /// wire event of their own.
    #[must_use]
    pub fn on_chunk(&self, chunk: &StreamChunk) -> Vec<SseEvent> {
        let mut delta = Map::new();

        if let Some(d) = &chunk.delta {
            if let Some(role) = &d.role {
                delta.insert("role".into(), json!(role));
            }
            if let Some(content) = &d.content {
                delta.insert("content".into(), json!(content));
                if d.thought {
                    delta.insert("_thought".into(), json!(true));
                }
            }
            if !d.tool_calls.is_empty() {
                let calls: Vec<Value> = d
                    .tool_calls
                    .iter()
                    .map(|call| {
                        let mut function = Map::new();
                        if let Some(name) = &call.name {
                            function.insert("name".into(), json!(name));
                        }
                        if let Some(args) = &call.arguments {
                            function.insert("arguments".into(), json!(args));
                        }
                        let mut entry = json!({
                            "index": call.index,
                            "function": Value::Object(function),
                        });
                        if let Some(id) = &call.id {
                            entry["id"] = json!(id);
                            entry["type"] = json!("function");
                        }
                        if let Some(sig) = &call.thought_signature {
                            entry["_thoughtSignature"] = json!(sig);
                        }
                        entry
                    })
                    .collect();
                delta.insert("tool_calls".into(), json!(calls));
            }
        }

        if delta.is_empty() && chunk.finish_reason.is_none() && chunk.usage.is_none() {
            return Vec::new();
        }

        let mut payload = json!({
            "id": self.id,
            "object": "chat.completion.chunk",
            "created": self.created,
            "model": self.model,
            "choices": [{
                "index": 0,
                "delta": Value::Object(delta),
                "finish_reason": chunk
                    .finish_reason
                    .map_or(Value::Null, |reason| json!(reason.as_str())),
            }],
        });
        if let Some(usage) = chunk.usage {
            payload["usage"] = json!({
                "prompt_tokens": usage.prompt_tokens,
                "completion_tokens": usage.completion_tokens,
                "total_tokens": usage.total(),
            });
        }

        vec![SseEvent::data(payload)]
    }

    /// A terminal error payload for failures after headers were sent.
    #[must_use]
    pub fn error_event(message: &str) -> SseEvent {
        SseEvent::data(json!({
            "error": {"message": message, "type": "server_error"}
        }))
    }
}
