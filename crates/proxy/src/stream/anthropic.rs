//! Anthropic Messages SSE re-emitter.
//!
//! Tracks the currently open content block (thinking, text, or tool_use)
//! and a monotonic block index, emitting the native Anthropic event
//! sequence: `message_start`, `content_block_start` / `_delta` / `_stop`
//! per block, then `message_delta` and `message_stop`. Thinking blocks
//! flush their cached signature as a `signature_delta` before closing.

use gembridge_client::SignatureStore;
use gembridge_types::{BridgeError, FinishReason, StreamChunk, TokenUsage};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

use super::SseEvent;

/// Placeholder emitted when a response carried no content at all.
pub const EMPTY_RESPONSE_TEXT: &str = "[No response received - please try again]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    None,
    Thinking,
    Text,
    ToolUse,
}

/// Stateful per-request emitter for the Anthropic Messages dialect.
pub struct AnthropicStream {
    message_id: String,
    model: String,
    signatures: Arc<SignatureStore>,
    block: BlockType,
    block_index: usize,
    started: bool,
    used_tool: bool,
    emitted_block: bool,
    finished: bool,
    /// Last valid thought signature seen in the current thinking block.
    pending_signature: Option<String>,
}

impl AnthropicStream {
    #[must_use]
    pub fn new(message_id: String, model: String, signatures: Arc<SignatureStore>) -> Self {
        Self {
            message_id,
            model,
            signatures,
            block: BlockType::None,
            block_index: 0,
            started: false,
            used_tool: false,
            emitted_block: false,
            finished: false,
            pending_signature: None,
        }
    }

    /// Translate one normalized chunk into its wire events.
    #[must_use]
    pub fn on_chunk(&mut self, chunk: &StreamChunk) -> Vec<SseEvent> {
        let mut events = Vec::new();

        if let Some(delta) = &chunk.delta {
            if delta.content.is_some() || !delta.tool_calls.is_empty() {
                self.ensure_started(&mut events);
            }

            if delta.thinking_end {
                self.close_block(&mut events);
            }

            if let Some(text) = &delta.content {
                if delta.thought {
                    if self.block != BlockType::Thinking {
                        self.open_block(
                            &mut events,
                            BlockType::Thinking,
                            json!({"type": "thinking", "thinking": ""}),
                        );
                    }
                    if !text.is_empty() {
                        events.push(self.block_delta(json!({
                            "type": "thinking_delta",
                            "thinking": text,
                        })));
                    }
                    if let Some(signature) = &delta.thought_signature {
                        self.pending_signature = Some(signature.clone());
                    }
                } else {
                    if self.block != BlockType::Text {
                        self.close_block(&mut events);
                        self.open_block(
                            &mut events,
                            BlockType::Text,
                            json!({"type": "text", "text": ""}),
                        );
                    }
                    if !text.is_empty() {
                        events.push(self.block_delta(json!({
                            "type": "text_delta",
                            "text": text,
                        })));
                    }
                }
            }

            for call in &delta.tool_calls {
                if let Some(id) = &call.id {
                    // A new tool call: close whatever is open and start a
                    // tool_use block.
                    self.close_block(&mut events);
                    self.used_tool = true;

                    let block_id = if id.is_empty() {
                        fresh_tool_id()
                    } else {
                        id.clone()
                    };
                    let signature = call
                        .thought_signature
                        .clone()
                        .or_else(|| self.signatures.tool(&block_id));

                    let mut content_block = json!({
                        "type": "tool_use",
                        "id": block_id,
                        "name": call.name.clone().unwrap_or_default(),
                        "input": {},
                    });
                    if let Some(sig) = signature {
                        content_block["signature"] = json!(sig);
                    }
                    self.open_block(&mut events, BlockType::ToolUse, content_block);

                    if let Some(args) = &call.arguments
                        && !args.is_empty()
                    {
                        events.push(self.block_delta(json!({
                            "type": "input_json_delta",
                            "partial_json": args,
                        })));
                    }
                } else if let Some(args) = &call.arguments
                    && self.block == BlockType::ToolUse
                {
                    events.push(self.block_delta(json!({
                        "type": "input_json_delta",
                        "partial_json": args,
                    })));
                }
            }
        }

        if let Some(reason) = chunk.finish_reason {
            events.extend(self.finish(reason, chunk.usage));
        }

        events
    }

    /// Emit the error event for a failure after headers were flushed.
    #[must_use]
    pub fn error_event(error: &BridgeError) -> SseEvent {
        SseEvent::named(
            "error",
            json!({
                "type": "error",
                "error": {"type": "api_error", "message": error.to_string()},
            }),
        )
    }

    fn finish(&mut self, reason: FinishReason, usage: Option<TokenUsage>) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        self.ensure_started(&mut events);

        if !self.emitted_block {
            self.open_block(
                &mut events,
                BlockType::Text,
                json!({"type": "text", "text": ""}),
            );
            events.push(self.block_delta(json!({
                "type": "text_delta",
                "text": EMPTY_RESPONSE_TEXT,
            })));
        }
        self.close_block(&mut events);

        let stop_reason = if self.used_tool {
            "tool_use"
        } else {
            reason.as_anthropic()
        };
        let usage = usage.unwrap_or_default();
        events.push(SseEvent::named(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {"stop_reason": stop_reason, "stop_sequence": Value::Null},
                "usage": {
                    "output_tokens": usage.completion_tokens,
                    "cache_read_input_tokens": 0,
                    "cache_creation_input_tokens": 0,
                },
            }),
        ));
        events.push(SseEvent::named(
            "message_stop",
            json!({"type": "message_stop"}),
        ));
        events
    }

    fn ensure_started(&mut self, events: &mut Vec<SseEvent>) {
        if self.started {
            return;
        }
        self.started = true;
        events.push(SseEvent::named(
            "message_start",
            json!({
                "type": "message_start",
                "message": {
                    "id": self.message_id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": self.model,
                    "stop_reason": Value::Null,
                    "stop_sequence": Value::Null,
                    "usage": {"input_tokens": 0, "output_tokens": 0},
                },
            }),
        ));
    }

    fn open_block(&mut self, events: &mut Vec<SseEvent>, block: BlockType, content_block: Value) {
        self.close_block(events);
        events.push(SseEvent::named(
            "content_block_start",
            json!({
                "type": "content_block_start",
                "index": self.block_index,
                "content_block": content_block,
            }),
        ));
        self.block = block;
        self.emitted_block = true;
    }

    fn close_block(&mut self, events: &mut Vec<SseEvent>) {
        if self.block == BlockType::None {
            return;
        }
        if self.block == BlockType::Thinking
            && let Some(signature) = self.pending_signature.take()
        {
            events.push(self.block_delta(json!({
                "type": "signature_delta",
                "signature": signature,
            })));
        }
        events.push(SseEvent::named(
            "content_block_stop",
            json!({"type": "content_block_stop", "index": self.block_index}),
        ));
        self.block_index += 1;
        self.block = BlockType::None;
    }

    fn block_delta(&self, delta: Value) -> SseEvent {
        SseEvent::named(
            "content_block_delta",
            json!({
                "type": "content_block_delta",
                "index": self.block_index,
                "delta": delta,
            }),
        )
    }
}

fn fresh_tool_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("toolu_{}", &hex[..24])
}

#[cfg(test)]
mod tests {
    use super::*;
    use gembridge_types::{ChunkDelta, ToolCallDelta};

    fn emitter() -> AnthropicStream {
        AnthropicStream::new(
            "msg_test".into(),
            "gemini-2.5-pro".into(),
            Arc::new(SignatureStore::new()),
        )
    }

    fn names(events: &[SseEvent]) -> Vec<&str> {
        events.iter().filter_map(|e| e.name).collect()
    }

    fn thought(text: &str, start: bool, signature: Option<&str>) -> StreamChunk {
        StreamChunk::delta(ChunkDelta {
            role: start.then(|| "assistant".to_string()),
            content: Some(text.into()),
            thought: true,
            thinking_start: start,
            thought_signature: signature.map(String::from),
            ..Default::default()
        })
    }

    fn tool_chunk(id: &str, name: &str, args: &str, signature: Option<&str>) -> StreamChunk {
        StreamChunk::delta(ChunkDelta {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: Some(id.into()),
                name: Some(name.into()),
                arguments: Some(args.into()),
                thought_signature: signature.map(String::from),
            }],
            ..Default::default()
        })
    }

    fn thinking_end() -> StreamChunk {
        StreamChunk::delta(ChunkDelta {
            thinking_end: true,
            ..Default::default()
        })
    }

    /// The thinking + tool-call scenario: signature_delta flushes before
    /// the thinking block closes, the tool_use block follows with the
    /// argument payload, and the stop reason is tool_use.
    #[test]
    fn test_thinking_then_tool_call_sequence() {
        let sig = "s".repeat(120);
        let mut emitter = emitter();
        let mut events = Vec::new();

        events.extend(emitter.on_chunk(&thought("Let me check", true, Some(&sig))));
        events.extend(emitter.on_chunk(&thinking_end()));
        events.extend(emitter.on_chunk(&tool_chunk(
            "call_1",
            "get_weather",
            "{\"city\":\"Paris\"}",
            None,
        )));
        events.extend(emitter.on_chunk(&StreamChunk::terminal(FinishReason::ToolCalls, None)));

        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta", // thinking_delta
                "content_block_delta", // signature_delta
                "content_block_stop",
                "content_block_start",
                "content_block_delta", // input_json_delta
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );

        assert_eq!(events[1].data["index"], 0);
        assert_eq!(events[1].data["content_block"]["type"], "thinking");
        assert_eq!(events[2].data["delta"]["thinking"], "Let me check");
        assert_eq!(events[3].data["delta"]["type"], "signature_delta");
        assert_eq!(events[3].data["delta"]["signature"], sig);
        assert_eq!(events[5].data["index"], 1);
        let block = &events[5].data["content_block"];
        assert_eq!(block["type"], "tool_use");
        assert_eq!(block["name"], "get_weather");
        assert_eq!(block["id"], "call_1");
        assert_eq!(
            events[6].data["delta"]["partial_json"],
            "{\"city\":\"Paris\"}"
        );
        assert_eq!(events[8].data["delta"]["stop_reason"], "tool_use");
    }

    #[test]
    fn test_plain_text_lifecycle() {
        let mut emitter = emitter();
        let mut events = Vec::new();
        events.extend(emitter.on_chunk(&StreamChunk::delta(ChunkDelta {
            role: Some("assistant".into()),
            content: Some("Hello".into()),
            ..Default::default()
        })));
        events.extend(emitter.on_chunk(&StreamChunk::terminal(
            FinishReason::Stop,
            Some(TokenUsage {
                prompt_tokens: 5,
                completion_tokens: 9,
            }),
        )));

        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert_eq!(events[1].data["content_block"]["type"], "text");
        assert_eq!(events[2].data["delta"]["text"], "Hello");
        assert_eq!(events[4].data["delta"]["stop_reason"], "end_turn");
        assert_eq!(events[4].data["usage"]["output_tokens"], 9);
    }

    #[test]
    fn test_every_delta_has_preceding_start_and_matching_stop() {
        let mut emitter = emitter();
        let mut events = Vec::new();
        events.extend(emitter.on_chunk(&thought("a", true, None)));
        events.extend(emitter.on_chunk(&thinking_end()));
        events.extend(emitter.on_chunk(&StreamChunk::delta(ChunkDelta {
            content: Some("b".into()),
            ..Default::default()
        })));
        events.extend(emitter.on_chunk(&tool_chunk("call_2", "t", "{}", None)));
        events.extend(emitter.on_chunk(&StreamChunk::terminal(FinishReason::ToolCalls, None)));

        let mut open: Option<i64> = None;
        let mut starts = 0;
        let mut stops = 0;
        for event in &events {
            match event.name.unwrap() {
                "content_block_start" => {
                    assert!(open.is_none(), "block started while another was open");
                    open = Some(event.data["index"].as_i64().unwrap());
                    starts += 1;
                }
                "content_block_delta" => {
                    assert_eq!(
                        open,
                        Some(event.data["index"].as_i64().unwrap()),
                        "delta outside an open block"
                    );
                }
                "content_block_stop" => {
                    assert_eq!(open, Some(event.data["index"].as_i64().unwrap()));
                    open = None;
                    stops += 1;
                }
                _ => {}
            }
        }
        assert!(open.is_none());
        assert_eq!(starts, stops);
        assert_eq!(starts, 3);
    }

    #[test]
    fn test_empty_response_placeholder() {
        let mut emitter = emitter();
        let events = emitter.on_chunk(&StreamChunk::terminal(FinishReason::Stop, None));
        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert_eq!(events[2].data["delta"]["text"], EMPTY_RESPONSE_TEXT);
    }

    #[test]
    fn test_cached_tool_signature_attached() {
        let store = Arc::new(SignatureStore::new());
        let sig = "z".repeat(110);
        store.record_tool("call_cached", &sig);
        let mut emitter =
            AnthropicStream::new("msg_x".into(), "gemini-2.5-pro".into(), Arc::clone(&store));

        let events = emitter.on_chunk(&tool_chunk("call_cached", "t", "{}", None));
        let start = events
            .iter()
            .find(|e| e.name == Some("content_block_start"))
            .unwrap();
        assert_eq!(start.data["content_block"]["signature"], sig);
    }

    #[test]
    fn test_fresh_tool_id_when_absent() {
        let mut emitter = emitter();
        let events = emitter.on_chunk(&tool_chunk("", "t", "{}", None));
        let start = events
            .iter()
            .find(|e| e.name == Some("content_block_start"))
            .unwrap();
        let id = start.data["content_block"]["id"].as_str().unwrap();
        assert!(id.starts_with("toolu_"));
        assert_eq!(id.len(), "toolu_".len() + 24);
    }

    #[test]
    fn test_max_tokens_stop_reason() {
        let mut emitter = emitter();
        let mut events = Vec::new();
        events.extend(emitter.on_chunk(&StreamChunk::delta(ChunkDelta {
            content: Some("partial".into()),
            ..Default::default()
        })));
        events.extend(emitter.on_chunk(&StreamChunk::terminal(FinishReason::Length, None)));
        let delta = events
            .iter()
            .find(|e| e.name == Some("message_delta"))
            .unwrap();
        assert_eq!(delta.data["delta"]["stop_reason"], "max_tokens");
    }

    #[test]
    fn test_error_event() {
        let event = AnthropicStream::error_event(&BridgeError::Http("broken pipe".into()));
        assert_eq!(event.name, Some("error"));
        assert_eq!(event.data["error"]["type"], "api_error");
        assert!(
            event.data["error"]["message"]
                .as_str()
                .unwrap()
                .contains("broken pipe")
        );
    }
}
