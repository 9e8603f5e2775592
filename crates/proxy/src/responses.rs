//! OpenAI Responses API handler.

use axum::{
    Json,
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
};
use async_stream::stream;
use futures_util::StreamExt as _;
use gembridge_client::{ModelFamily, registry};
use gembridge_translate::{
    OpenAiToGemini, ResponsesResponse, apply_thinking_budget, parse_model_suffix,
    responses_to_chat,
};
use gembridge_types::{RequestTranslator as _, ResponsesRequest};
use serde_json::Value;
use std::{convert::Infallible, sync::Arc};
use uuid::Uuid;

use crate::{AppState, error::ApiError, sse_response, stream::ResponsesStream};

/// Handles `POST /openai/v1/responses`.
///
/// Adapts the Responses request into the chat shape, translates it into
/// the Gemini schema, and emits the Responses output-item event sequence
/// when streaming, or a complete `response` object otherwise.
///
/// # Errors
///
/// Returns [`ApiError`] in the OpenAI error shape.
pub async fn responses(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResponsesRequest>,
) -> Result<Response, ApiError> {
    let requested = request.model.clone().unwrap_or_default();
    let family = ModelFamily::of(&requested);
    let suffix_budget = parse_model_suffix(&requested).thinking_budget;
    let resolved = registry::resolve(request.model.as_deref());
    let streaming = request.stream;

    let chat_body = responses_to_chat(&request.into_body()).map_err(ApiError::openai)?;
    let mut gemini_req = OpenAiToGemini
        .translate_request(chat_body)
        .map_err(ApiError::openai)?;
    if let Some(budget) = suffix_budget {
        apply_thinking_budget(&mut gemini_req, budget);
    }

    let model = state.fallback.best_available(&resolved);
    let response_id = format!("resp_{}", Uuid::new_v4().simple());
    tracing::debug!(%model, stream = streaming, "dispatching responses request");

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
            .map_err(ApiError::openai)?;

        let mut emitter = ResponsesStream::new(response_id, served);
        let body = stream! {
            for event in emitter.start() {
                yield Ok::<_, Infallible>(event.to_bytes());
            }
            let mut chunks = chunks;
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        for event in emitter.on_chunk(&chunk) {
                            yield Ok(event.to_bytes());
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "upstream stream failed mid-flight");
                        yield Ok(ResponsesStream::error_event(&err).to_bytes());
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
            .map_err(ApiError::openai)?;
        let payload: Value = ResponsesResponse {
            outcome: &outcome,
            model: &served,
            id: &response_id,
        }
        .into();
        Ok(Json(payload).into_response())
    }
}
