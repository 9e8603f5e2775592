//! API error type mapping [`BridgeError`] variants to HTTP responses in
//! the caller's dialect.
//!
//! The same failure surfaces differently per dialect: rate limits become
//! HTTP 400 `invalid_request_error` bodies on the Anthropic path (Anthropic
//! SDKs retry 429/5xx forever) but HTTP 500 on the OpenAI path.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gembridge_types::BridgeError;
use serde_json::json;

/// The wire dialect an error must be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    OpenAi,
    Anthropic,
}

/// Wrapper around [`BridgeError`] that implements [`IntoResponse`] for a
/// specific dialect.
pub struct ApiError {
    pub error: BridgeError,
    pub dialect: Dialect,
}

impl ApiError {
    #[must_use]
    pub fn openai(error: BridgeError) -> Self {
        Self {
            error,
            dialect: Dialect::OpenAi,
        }
    }

    #[must_use]
    pub fn anthropic(error: BridgeError) -> Self {
        Self {
            error,
            dialect: Dialect::Anthropic,
        }
    }

    /// Returns `(status, error_type)` for the wrapped error.
    fn classify(&self) -> (StatusCode, &'static str) {
        match (&self.error, self.dialect) {
            (BridgeError::InvalidRequest(_) | BridgeError::Translation(_), _) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
            // Surfaced as a client error so Anthropic SDKs stop retrying.
            (BridgeError::RateLimited { .. }, Dialect::Anthropic) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
            (BridgeError::RateLimited { .. }, Dialect::OpenAi) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
            (BridgeError::Auth(_), _) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            (_, Dialect::Anthropic) => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
            (_, Dialect::OpenAi) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();
        let message = self.error.to_string();
        let body = match self.dialect {
            Dialect::OpenAi => json!({
                "error": {"message": message, "type": error_type}
            }),
            Dialect::Anthropic => json!({
                "type": "error",
                "error": {"type": error_type, "message": message}
            }),
        };
        (status, Json(body)).into_response()
    }
}
