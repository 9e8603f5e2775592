//! OpenAI Responses API SSE re-emitter.
//!
//! Emits the output-item event sequence: a message item for streamed text
//! and one function-call item per tool call, each opened with
//! `response.output_item.added` and closed with `response.output_item.done`,
//! ending in `response.completed` with the fully assembled output. Output
//! indices are strictly increasing across items.

use gembridge_types::{BridgeError, StreamChunk, TokenUsage};
use serde_json::{Value, json};

use super::SseEvent;

#[derive(Debug, Clone)]
struct ToolItem {
    item_id: String,
    call_id: String,
    name: String,
    arguments: String,
    output_index: usize,
}

/// Stateful per-request emitter for the Responses dialect.
pub struct ResponsesStream {
    response_id: String,
    model: String,
    output_index: usize,
    message_open: bool,
    message_index: usize,
    message_count: usize,
    text: String,
    open_tool: Option<ToolItem>,
    done_tools: Vec<ToolItem>,
    usage: TokenUsage,
    finished: bool,
}

impl ResponsesStream {
    #[must_use]
    pub fn new(response_id: String, model: String) -> Self {
        Self {
            response_id,
            model,
            output_index: 0,
            message_open: false,
            message_index: 0,
            message_count: 0,
            text: String::new(),
            open_tool: None,
            done_tools: Vec::new(),
            usage: TokenUsage::default(),
            finished: false,
        }
    }

    /// The opening `response.created` / `response.in_progress` pair.
    #[must_use]
    pub fn start(&self) -> Vec<SseEvent> {
        vec![
            SseEvent::named(
                "response.created",
                json!({
                    "type": "response.created",
                    "response": self.snapshot("in_progress", Vec::new()),
                }),
            ),
            SseEvent::named(
                "response.in_progress",
                json!({
                    "type": "response.in_progress",
                    "response": self.snapshot("in_progress", Vec::new()),
                }),
            ),
        ]
    }

    /// Translate one normalized chunk into its wire events.
    #[must_use]
    pub fn on_chunk(&mut self, chunk: &StreamChunk) -> Vec<SseEvent> {
        let mut events = Vec::new();

        if let Some(delta) = &chunk.delta {
            // Thought text has no Responses-wire representation.
            if let Some(text) = &delta.content
                && !delta.thought
                && !text.is_empty()
            {
                self.close_tool_item(&mut events);
                if !self.message_open {
                    self.open_message_item(&mut events);
                }
                self.text.push_str(text);
                events.push(SseEvent::named(
                    "response.output_text.delta",
                    json!({
                        "type": "response.output_text.delta",
                        "item_id": self.message_item_id(),
                        "output_index": self.message_index,
                        "content_index": 0,
                        "delta": text,
                    }),
                ));
            }

            for call in &delta.tool_calls {
                if let Some(id) = &call.id {
                    self.close_message_item(&mut events);
                    self.close_tool_item(&mut events);

                    let output_index = self.output_index;
                    self.output_index += 1;
                    let item = ToolItem {
                        item_id: format!("fc_{}_{output_index}", self.response_id),
                        call_id: id.clone(),
                        name: call.name.clone().unwrap_or_default(),
                        arguments: String::new(),
                        output_index,
                    };
                    events.push(SseEvent::named(
                        "response.output_item.added",
                        json!({
                            "type": "response.output_item.added",
                            "output_index": output_index,
                            "item": {
                                "type": "function_call",
                                "id": item.item_id,
                                "call_id": item.call_id,
                                "name": item.name,
                                "arguments": "",
                                "status": "in_progress",
                            },
                        }),
                    ));
                    self.open_tool = Some(item);
                }
                if let Some(args) = &call.arguments
                    && !args.is_empty()
                    && let Some(item) = self.open_tool.as_mut()
                {
                    item.arguments.push_str(args);
                    let (item_id, output_index) = (item.item_id.clone(), item.output_index);
                    events.push(SseEvent::named(
                        "response.function_call_arguments.delta",
                        json!({
                            "type": "response.function_call_arguments.delta",
                            "item_id": item_id,
                            "output_index": output_index,
                            "delta": args,
                        }),
                    ));
                }
            }
        }

        if let Some(usage) = chunk.usage {
            self.usage = usage;
        }
        if chunk.finish_reason.is_some() {
            events.extend(self.finish());
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
                "code": "server_error",
                "message": error.to_string(),
            }),
        )
    }

    fn finish(&mut self) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        self.close_message_item(&mut events);
        self.close_tool_item(&mut events);

        let output = self.assembled_output();
        events.push(SseEvent::named(
            "response.completed",
            json!({
                "type": "response.completed",
                "response": self.snapshot("completed", output),
            }),
        ));
        events
    }

    fn open_message_item(&mut self, events: &mut Vec<SseEvent>) {
        self.message_index = self.output_index;
        self.output_index += 1;
        self.message_open = true;
        self.message_count += 1;
        self.text.clear();

        events.push(SseEvent::named(
            "response.output_item.added",
            json!({
                "type": "response.output_item.added",
                "output_index": self.message_index,
                "item": {
                    "type": "message",
                    "id": self.message_item_id(),
                    "role": "assistant",
                    "content": [],
                    "status": "in_progress",
                },
            }),
        ));
        events.push(SseEvent::named(
            "response.content_part.added",
            json!({
                "type": "response.content_part.added",
                "item_id": self.message_item_id(),
                "output_index": self.message_index,
                "content_index": 0,
                "part": {"type": "output_text", "text": "", "annotations": []},
            }),
        ));
    }

    fn close_message_item(&mut self, events: &mut Vec<SseEvent>) {
        if !self.message_open {
            return;
        }
        self.message_open = false;
        let item_id = self.message_item_id();

        events.push(SseEvent::named(
            "response.output_text.done",
            json!({
                "type": "response.output_text.done",
                "item_id": item_id,
                "output_index": self.message_index,
                "content_index": 0,
                "text": self.text,
            }),
        ));
        events.push(SseEvent::named(
            "response.content_part.done",
            json!({
                "type": "response.content_part.done",
                "item_id": item_id,
                "output_index": self.message_index,
                "content_index": 0,
                "part": {"type": "output_text", "text": self.text, "annotations": []},
            }),
        ));
        events.push(SseEvent::named(
            "response.output_item.done",
            json!({
                "type": "response.output_item.done",
                "output_index": self.message_index,
                "item": {
                    "type": "message",
                    "id": item_id,
                    "role": "assistant",
                    "status": "completed",
                    "content": [{"type": "output_text", "text": self.text, "annotations": []}],
                },
            }),
        ));
    }

    fn close_tool_item(&mut self, events: &mut Vec<SseEvent>) {
        let Some(item) = self.open_tool.take() else {
            return;
        };
        events.push(SseEvent::named(
            "response.function_call_arguments.done",
            json!({
                "type": "response.function_call_arguments.done",
                "item_id": item.item_id,
                "output_index": item.output_index,
                "arguments": item.arguments,
            }),
        ));
        events.push(SseEvent::named(
            "response.output_item.done",
            json!({
                "type": "response.output_item.done",
                "output_index": item.output_index,
                "item": {
                    "type": "function_call",
                    "id": item.item_id,
                    "call_id": item.call_id,
                    "name": item.name,
                    "arguments": item.arguments,
                    "status": "completed",
                },
            }),
        ));
        self.done_tools.push(item);
    }

    fn assembled_output(&self) -> Vec<Value> {
        let mut output = Vec::new();
        if self.message_count > 0 && !self.text.is_empty() {
            output.push(json!({
                "type": "message",
                "id": self.message_item_id(),
                "role": "assistant",
                "status": "completed",
                "content": [{"type": "output_text", "text": self.text, "annotations": []}],
            }));
        }
        for item in &self.done_tools {
            output.push(json!({
                "type": "function_call",
                "id": item.item_id,
                "call_id": item.call_id,
                "name": item.name,
                "arguments": item.arguments,
                "status": "completed",
            }));
        }
        output
    }

    fn snapshot(&self, status: &str, output: Vec<Value>) -> Value {
        json!({
            "id": self.response_id,
            "object": "response",
            "status": status,
            "model": self.model,
            "output": output,
            "usage": {
                "input_tokens": self.usage.prompt_tokens,
                "output_tokens": self.usage.completion_tokens,
                "total_tokens": self.usage.total(),
            },
        })
    }

    fn message_item_id(&self) -> String {
        format!("msg_{}_{}", self.response_id, self.message_count)
    }
}
