//! Strongly-typed envelopes for the three inbound request dialects.
//!
//! Replaces raw `serde_json::Value` usage at the API boundary, providing
//! compile-time access to the fields the proxy itself inspects (`model`,
//! `stream`, Anthropic `max_tokens`) while preserving forward-compatibility
//! through a catch-all extra map. Use `into_body` to reconstruct a full
//! `serde_json::Value` for translator consumption.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An OpenAI-compatible chat completion request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model identifier (e.g. `"gemini-2.5-flash"`); resolved to a
    /// canonical Gemini id downstream, defaulting when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Whether to use streaming SSE mode.
    #[serde(default)]
    pub stream: bool,
    /// The conversation messages.
    #[serde(default)]
    pub messages: Option<Vec<Value>>,
    /// All remaining fields not captured above.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatRequest {
    /// Reconstructs the full request body as a `serde_json::Value`.
    #[must_use]
    pub fn into_body(self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.extra.len() + 3);
        for (k, v) in self.extra {
            map.insert(k, v);
        }
        if let Some(model) = self.model {
            map.insert("model".into(), Value::String(model));
        }
        map.insert("stream".into(), Value::Bool(self.stream));
        if let Some(messages) = self.messages {
            map.insert("messages".into(), Value::Array(messages));
        }
        Value::Object(map)
    }
}

/// An Anthropic Messages API request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    #[serde(default)]
    pub model: Option<String>,
    /// Required by the Messages API; validated before any upstream call.
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub messages: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl MessagesRequest {
    /// Reconstructs the full request body as a `serde_json::Value`.
    #[must_use]
    pub fn into_body(self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.extra.len() + 4);
        for (k, v) in self.extra {
            map.insert(k, v);
        }
        if let Some(model) = self.model {
            map.insert("model".into(), Value::String(model));
        }
        if let Some(max_tokens) = self.max_tokens {
            map.insert("max_tokens".into(), Value::from(max_tokens));
        }
        map.insert("stream".into(), Value::Bool(self.stream));
        if let Some(messages) = self.messages {
            map.insert("messages".into(), Value::Array(messages));
        }
        Value::Object(map)
    }
}

/// An OpenAI Responses API request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    #[serde(default)]
    pub model: Option<String>,
    /// Either a bare string or an array of input items.
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ResponsesRequest {
    /// Reconstructs the full request body as a `serde_json::Value`.
    #[must_use]
    pub fn into_body(self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.extra.len() + 4);
        for (k, v) in self.extra {
            map.insert(k, v);
        }
        if let Some(model) = self.model {
            map.insert("model".into(), Value::String(model));
        }
        if let Some(input) = self.input {
            map.insert("input".into(), input);
        }
        if let Some(instructions) = self.instructions {
            map.insert("instructions".into(), Value::String(instructions));
        }
        map.insert("stream".into(), Value::Bool(self.stream));
        Value::Object(map)
    }
}
