//! The normalized stream chunk — the dialect-agnostic unit that flows from
//! the Gemini streaming client to the SSE re-emitters.
//!
//! A chunk carries at most one delta (visible text, thought text, or
//! tool-call fragments) plus optional terminal metadata (`finish_reason`,
//! `usage`). Thinking blocks are delimited with explicit `thinking_start` /
//! `thinking_end` markers so re-emitters never have to infer block
//! boundaries from content.

/// Terminal reason for a response, in OpenAI vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

impl FinishReason {
    /// The OpenAI wire string for this reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolCalls => "tool_calls",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
        }
    }

    /// The Anthropic `stop_reason` equivalent.
    #[must_use]
    pub fn as_anthropic(self) -> &'static str {
        match self {
            Self::ToolCalls => "tool_use",
            Self::Length => "max_tokens",
            Self::Stop | Self::ContentFilter => "end_turn",
        }
    }
}

/// Token accounting reported by the upstream, mapped to OpenAI field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// An incremental fragment of one tool call.
///
/// The first fragment of a call carries `id` and `name`; argument text may
/// arrive split across any number of fragments at the same `index`.
#[derive(Debug, Clone, Default)]
pub struct ToolCallDelta {
    /// Position of the call within the response; all fragments of one call
    /// share a single index.
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Incremental JSON-encoded argument text.
    pub arguments: Option<String>,
    /// Upstream thought signature attached to this call, when present.
    pub thought_signature: Option<String>,
}

/// The delta payload of one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkDelta {
    /// Set to `"assistant"` on the first chunk of a response only.
    pub role: Option<String>,
    /// Visible or thought text, depending on `thought`.
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    /// `content` belongs to a thinking block.
    pub thought: bool,
    /// This chunk opens a thinking block.
    pub thinking_start: bool,
    /// This chunk closes the currently open thinking block.
    pub thinking_end: bool,
    /// Signature attached to a thought text part, when present and valid.
    pub thought_signature: Option<String>,
}

impl ChunkDelta {
    /// Returns `true` when the delta carries nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.content.is_none()
            && self.tool_calls.is_empty()
            && !self.thinking_start
            && !self.thinking_end
    }
}

/// One unit of the normalized stream.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub delta: Option<ChunkDelta>,
    /// Present on exactly one chunk, the last.
    pub finish_reason: Option<FinishReason>,
    /// Present at most once, on or after the finish-reason chunk.
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    /// A chunk carrying only a delta.
    #[must_use]
    pub fn delta(delta: ChunkDelta) -> Self {
        Self {
            delta: Some(delta),
            ..Self::default()
        }
    }

    /// The terminal chunk.
    #[must_use]
    pub fn terminal(finish_reason: FinishReason, usage: Option<TokenUsage>) -> Self {
        Self {
            delta: None,
            finish_reason: Some(finish_reason),
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_strings() {
        assert_eq!(FinishReason::Stop.as_str(), "stop");
        assert_eq!(FinishReason::ToolCalls.as_str(), "tool_calls");
        assert_eq!(FinishReason::Length.as_str(), "length");
        assert_eq!(FinishReason::ContentFilter.as_str(), "content_filter");
    }

    #[test]
    fn test_finish_reason_anthropic_strings() {
        assert_eq!(FinishReason::Stop.as_anthropic(), "end_turn");
        assert_eq!(FinishReason::ToolCalls.as_anthropic(), "tool_use");
        assert_eq!(FinishReason::Length.as_anthropic(), "max_tokens");
    }

    #[test]
    fn test_usage_total() {
        let u = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        assert_eq!(u.total(), 15);
    }

    #[test]
    fn test_delta_is_empty() {
        assert!(ChunkDelta::default().is_empty());
        let d = ChunkDelta {
            content: Some("hi".into()),
            ..Default::default()
        };
        assert!(!d.is_empty());
        let d = ChunkDelta {
            thinking_end: true,
            ..Default::default()
        };
        assert!(!d.is_empty());
    }

    #[test]
    fn test_terminal_chunk() {
        let c = StreamChunk::terminal(
            FinishReason::Stop,
            Some(TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 2,
            }),
        );
        assert!(c.delta.is_none());
        assert_eq!(c.finish_reason, Some(FinishReason::Stop));
        assert_eq!(c.usage.unwrap().total(), 3);
    }
}
