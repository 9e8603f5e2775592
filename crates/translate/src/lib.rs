//! Request and response translators between client dialects and the Gemini
//! schema.
//!
//! This crate provides the pure mapping layer of gembridge: inbound OpenAI
//! chat, Anthropic Messages, and OpenAI Responses requests are reduced to
//! the Gemini `generateContent` body, tool parameter schemas are normalized
//! to the Gemini-accepted subset, and accumulated chunk streams are expanded
//! back into each dialect's complete response object. All translators are
//! pure functions with no I/O.

pub mod anthropic_to_gemini;
pub mod collect;
pub mod gemini_to_anthropic;
pub mod gemini_to_openai;
pub mod gemini_to_responses;
pub mod openai_to_gemini;
pub mod responses_to_chat;
pub mod schema;
pub mod thinking;

pub use anthropic_to_gemini::AnthropicToGemini;
pub use collect::{CollectedToolCall, StreamCollector, StreamOutcome};
pub use gemini_to_anthropic::{AnthropicMessage, EMPTY_RESPONSE_TEXT};
pub use gemini_to_openai::ChatCompletion;
pub use gemini_to_responses::ResponsesResponse;
pub use openai_to_gemini::OpenAiToGemini;
pub use responses_to_chat::responses_to_chat;
pub use schema::normalize_schema;
pub use thinking::{ModelSuffix, apply_thinking_budget, effort_budget, parse_model_suffix};
