//! Accumulates a normalized chunk stream into a single response value for
//! the non-streaming paths.

use gembridge_types::{FinishReason, StreamChunk, TokenUsage};

/// One fully assembled tool call.
#[derive(Debug, Clone)]
pub struct CollectedToolCall {
    pub id: String,
    pub name: String,
    /// Concatenation of all argument deltas; parses as JSON when the
    /// upstream completed normally.
    pub arguments: String,
    pub thought_signature: Option<String>,
}

/// The result of draining a chunk stream.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub content: String,
    pub thinking: String,
    pub tool_calls: Vec<CollectedToolCall>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// Incremental accumulator over [`StreamChunk`]s.
#[derive(Debug, Default)]
pub struct StreamCollector {
    content: String,
    thinking: String,
    tool_calls: Vec<(usize, CollectedToolCall)>,
    finish_reason: Option<FinishReason>,
    usage: Option<TokenUsage>,
}

impl StreamCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk into the accumulated state.
    pub fn push(&mut self, chunk: &StreamChunk) {
        if let Some(delta) = &chunk.delta {
            if let Some(text) = &delta.content {
                if delta.thought {
                    self.thinking.push_str(text);
                } else {
                    self.content.push_str(text);
                }
            }
            for call in &delta.tool_calls {
                // A delta carrying an id opens a new call; argument-only
                // deltas extend the call already open at that index.
                if let Some(id) = &call.id {
                    self.tool_calls.push((
                        call.index,
                        CollectedToolCall {
                            id: id.clone(),
                            name: call.name.clone().unwrap_or_default(),
                            arguments: call.arguments.clone().unwrap_or_default(),
                            thought_signature: call.thought_signature.clone(),
                        },
                    ));
                } else if let Some(args) = &call.arguments
                    && let Some((_, open)) = self
                        .tool_calls
                        .iter_mut()
                        .rev()
                        .find(|(index, _)| *index == call.index)
                {
                    open.arguments.push_str(args);
                }
            }
        }
        if let Some(reason) = chunk.finish_reason {
            self.finish_reason = Some(reason);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
    }

    /// Consume the collector, producing the final outcome.
    #[must_use]
    pub fn finish(self) -> StreamOutcome {
        let tool_calls: Vec<CollectedToolCall> =
            self.tool_calls.into_iter().map(|(_, call)| call).collect();
        let finish_reason = self.finish_reason.unwrap_or(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });
        StreamOutcome {
            content: self.content,
            thinking: self.thinking,
            tool_calls,
            finish_reason,
            usage: self.usage.unwrap_or_default(),
        }
    }
}
