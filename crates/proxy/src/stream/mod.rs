//! SSE re-emitters: convert the normalized chunk stream into each
//! dialect's wire events.

pub mod anthropic;
pub mod openai;
pub mod responses;

pub use anthropic::AnthropicStream;
pub use openai::OpenAiStream;
pub use responses::ResponsesStream;

use bytes::Bytes;
use serde_json::Value;

/// One outbound SSE event: an optional event name and a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub name: Option<&'static str>,
    pub data: Value,
}

impl SseEvent {
    /// A named event (`event: <name>` line included).
    #[must_use]
    pub fn named(name: &'static str, data: Value) -> Self {
        Self {
            name: Some(name),
            data,
        }
    }

    /// An unnamed `data:`-only event.
    #[must_use]
    pub fn data(data: Value) -> Self {
        Self { name: None, data }
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let payload = serde_json::to_string(&self.data).unwrap_or_default();
        match self.name {
            Some(name) => Bytes::from(format!("event: {name}\ndata: {payload}\n\n")),
            None => Bytes::from(format!("data: {payload}\n\n")),
        }
    }
}

/// The OpenAI stream terminator.
#[must_use]
pub fn done_bytes() -> Bytes {
    Bytes::from("data: [DONE]\n\n")
}
