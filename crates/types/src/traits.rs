//! Async traits and stream aliases shared across all gembridge crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers
//! depend only on `gembridge-types`, not on each other.

use crate::{BridgeError, chunk::StreamChunk};
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// A pinned, sendable stream of SSE byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A pinned, sendable stream of normalized chunks — the pipe between the
/// Gemini streaming client and the SSE re-emitters.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// The authentication capability consumed by the streaming client.
///
/// The OAuth ceremony and on-disk token cache live behind this trait; the
/// core only fetches bearer tokens, invalidates them on 401, and asks for a
/// pre-configured project id.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Obtain a valid access token, refreshing if stale.
    async fn access_token(&self) -> Result<String>;

    /// Force a refresh on the next [`AuthClient::access_token`] call.
    fn invalidate_token(&self);

    /// An explicit project id, if one was configured or found in the
    /// environment (`GOOGLE_CLOUD_PROJECT`, `GOOGLE_CLOUD_PROJECT_ID`).
    fn project_hint(&self) -> Option<String>;
}

/// Translates an inbound dialect request into the Gemini request body
/// (`contents`, `systemInstruction`, `tools`, `toolConfig`,
/// `generationConfig`).
///
/// Implementations must be pure (no I/O).
pub trait RequestTranslator: Send + Sync {
    /// Convert a dialect JSON request body to the Gemini format.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] or
    /// [`BridgeError::Translation`] if the request cannot be translated.
    fn translate_request(&self, req: Value) -> Result<Value>;
}
