//! Core types and traits for the gembridge workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! gembridge proxy: the error type, OAuth token representation, the
//! normalized stream-chunk model that connects the Gemini client to the SSE
//! re-emitters, typed request envelopes for the three inbound dialects, and
//! the async traits implemented by the auth layer.

pub mod chunk;
pub mod error;
pub mod request;
pub mod token;
pub mod traits;

pub use chunk::{ChunkDelta, FinishReason, StreamChunk, TokenUsage, ToolCallDelta};
pub use error::BridgeError;
pub use request::{ChatRequest, MessagesRequest, ResponsesRequest};
pub use token::{OAuthToken, TokenState};
pub use traits::{AuthClient, ByteStream, ChunkStream, RequestTranslator};
