//! Gemini Code Assist client layer: model registry, signature cache,
//! cooldown tracking, rate-limit fallback routing, and the authenticated
//! streaming client that turns upstream SSE into the normalized chunk
//! stream.

pub mod cooldown;
pub mod fallback;
pub mod gemini;
pub mod registry;
pub mod signatures;
pub mod sse;

pub use cooldown::{CooldownTracker, DEFAULT_COOLDOWN};
pub use fallback::FallbackRouter;
pub use gemini::{CODE_ASSIST_BASE, CodeAssistClient};
pub use registry::{CANONICAL_MODELS, DEFAULT_MODEL, ModelFamily, resolve};
pub use signatures::SignatureStore;
pub use sse::SseDecoder;
