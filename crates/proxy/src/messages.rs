//! Anthropic Messages handler.

use axum::{
    Json,
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
};
use async_stream::stream;
use futures_util::StreamExt as _;
use gembridge_client::{ModelFamily, registry};
use gembridge_translate::{AnthropicMessage, AnthropicToGemini, apply_thinking_budget, parse_model_suffix};
use gembridge_types::{MessagesRequest, RequestTranslator as _};
use serde_json::Value;
use std::{convert::Infallible, sync::Arc};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    sse_response,
    stream::AnthropicStream,
};

/// Handles `POST /anthropic/v1/messages`.
///
/// Validates the Messages request (`max_tokens` is required), translates it
/// into the Gemini schema, and streams native Anthropic events or returns a
/// complete `message` object. Rate limits surface as HTTP 400 on this path
/// so Anthropic SDKs do not retry indefinitely.
///
/// # Errors
///
/// Returns [`ApiError`] in the Anthropic error shape.
pub async fn messages(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessagesRequest>,
) -> Result<Response, ApiError> {
    let requested = request.model.clone().unwrap_or_default();
    let family = ModelFamily::of(&requested);
    let suffix_budget = parse_model_suffix(&requested).thinking_budget;
    let resolved = registry::resolve(request.model.as_deref());
    let streaming = request.stream;

    // Dialect validation happens before any upstream call.
    let mut gemini_req = AnthropicToGemini
        .translate_request(request.into_body())
        .map_err(ApiError::anthropic)?;
    if let Some(budget) = suffix_budget {
        apply_thinking_budget(&mut gemini_req, budget);
    }

    let model = state.fallback.best_available(&resolved);
    let message_id = format!("msg_{}", Uuid::new_v4().simple());
    tracing::debug!(%model, stream = streaming, "dispatching messages request");

    let dispatch = |m: String| {
        let state = Arc::clone(&state);
        let request = gemini_req.clone();
        async move { state.client.stream_generate(&m, family, request).await }
    };

    if streaming {
        let (served, chunks) = state
            .fallback
            .run_streaming(&model, dispatch)
            .await
            .map_err(ApiError::anthropic)?;

        let mut emitter =
            AnthropicStream::new(message_id, served, Arc::clone(&state.signatures));
        let body = stream! {
            let mut chunks = chunks;
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        for event in emitter.on_chunk(&chunk) {
                            yield Ok::<_, Infallible>(event.to_bytes());
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "upstream stream failed mid-flight");
                        yield Ok(AnthropicStream::error_event(&err).to_bytes());
                        break;
                    }
                }
            }
        };
        Ok(sse_response(Body::from_stream(body)))
    } else {
        let (served, outcome) = state
            .fallback
            .run_collected(&model, dispatch)
            .await
            .map_err(ApiError::anthropic)?;
        let payload: Value = AnthropicMessage {
            outcome: &outcome,
            model: &served,
            id: &message_id,
        }
        .into();
        Ok(Json(payload).into_response())
    }
}
