//! HTTP proxy layer — axum router, per-dialect handlers, dialect-aware
//! error mapping, and the SSE re-emitters.
//!
//! Routes:
//! - `POST /openai/v1/chat/completions` — OpenAI chat dialect
//! - `POST /openai/v1/responses` — OpenAI Responses dialect
//! - `GET  /openai/v1/models`
//! - `POST /anthropic/v1/messages` — Anthropic Messages dialect
//! - `GET  /anthropic/v1/models`
//! - `GET  /health`

mod chat;
mod error;
mod messages;
mod models;
mod responses;
pub mod stream;

pub use error::{ApiError, Dialect};

use axum::{
    Router,
    body::Body,
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use gembridge_client::{CodeAssistClient, FallbackRouter, SignatureStore};
use gembridge_config::Config;
use gembridge_types::AuthClient;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// HTTP client shared with the upstream layer.
    pub http: rquest::Client,
    /// Auth capability (token fetch / invalidate / project hint).
    pub auth: Arc<dyn AuthClient>,
    /// Process-wide thought-signature cache.
    pub signatures: Arc<SignatureStore>,
    /// Rate-limit fallback router with cooldown tracking.
    pub fallback: FallbackRouter,
    /// The Code Assist streaming client.
    pub client: CodeAssistClient,
}

impl AppState {
    /// Creates the shared application state wrapped in an `Arc`.
    pub fn new(config: Config, auth: Arc<dyn AuthClient>) -> Arc<Self> {
        let http = rquest::Client::new();
        let signatures = Arc::new(SignatureStore::new());
        let mut client = CodeAssistClient::new(
            http.clone(),
            Arc::clone(&auth),
            Arc::clone(&signatures),
        );
        if let Some(base) = &config.upstream_base_url {
            client = client.with_base_url(base.clone());
        }
        let fallback =
            FallbackRouter::new(config.auto_switch, Duration::from_secs(config.cooldown_secs));
        Arc::new(Self {
            config,
            http,
            auth,
            signatures,
            fallback,
            client,
        })
    }
}

/// Build the full axum router.
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/openai/v1/chat/completions", post(chat::chat_completions))
        .route("/openai/v1/responses", post(responses::responses))
        .route("/openai/v1/models", get(models::list_openai_models))
        .route("/anthropic/v1/messages", post(messages::messages))
        .route("/anthropic/v1/models", get(models::list_anthropic_models))
        .route("/health", get(models::health))
        .with_state(state)
}

/// A streaming SSE response with the standard proxy headers.
pub(crate) fn sse_response(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("x-accel-buffering", "no")
        .body(body)
        .expect("valid response")
}
