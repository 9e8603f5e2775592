//! Unified error type for the gembridge workspace.

use std::time::Duration;
use thiserror::Error;

/// Enumerates all error kinds that can occur across gembridge crates.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Client request failed dialect validation (missing `messages`,
    /// missing Anthropic `max_tokens`, malformed body).
    #[error("{0}")]
    InvalidRequest(String),

    /// OAuth or credential authentication failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Request or response format translation failure.
    #[error("translation error: {0}")]
    Translation(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(String),

    /// Upstream quota exhaustion (HTTP 429). `message` carries the
    /// human-readable reset estimate shown to clients.
    #[error("{message}")]
    RateLimited {
        status: u16,
        reset_after: Option<Duration>,
        message: String,
    },

    /// The upstream returned a non-success, non-429 status.
    #[error("upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rquest::Error> for BridgeError {
    fn from(e: rquest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl BridgeError {
    /// Returns `true` if the error is likely transient and worth retrying
    /// on a different model or at a later time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => matches!(status, 408 | 500..=504),
            Self::RateLimited { .. } | Self::Http(_) => true,
            _ => false,
        }
    }

    /// Returns `true` for the typed rate-limit variant.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BridgeError>;
