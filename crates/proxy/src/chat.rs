//! OpenAI chat-completions handler.

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
    ChatCompletion, OpenAiToGemini, apply_thinking_budget, parse_model_suffix,
};
use gembridge_types::{ChatRequest, RequestTranslator as _};
use serde_json::Value;
use std::{convert::Infallible, sync::Arc};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    sse_response,
    stream::{OpenAiStream, done_bytes},
};

/// Handles `POST /openai/v1/chat/completions`.
///
/// Translates the request into the Gemini schema, dispatches through the
/// fallback router, and returns either a complete `chat.completion` object
/// or a `chat.completion.chunk` SSE stream closed by `data: [DONE]`.
///
/// # Errors
///
/// Returns [`ApiError`] in the OpenAI error shape for validation and
/// upstream failures that occur before streaming begins.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let requested = request.model.clone().unwrap_or_default();
    let family = ModelFamily::of(&requested);
    let suffix_budget = parse_model_suffix(&requested).thinking_budget;
    let resolved = registry::resolve(request.model.as_deref());
    let streaming = request.stream;

    let mut gemini_req = OpenAiToGemini
        .translate_request(request.into_body())
        .map_err(ApiError::openai)?;
    if let Some(budget) = suffix_budget {
        apply_thinking_budget(&mut gemini_req, budget);
    }

    let model = state.fallback.best_available(&resolved);
    let chat_id = format!("chatcmpl-{}", Uuid::new_v4().simple());
    tracing::debug!(%model, stream = streaming, "dispatching chat completion");

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

        let emitter = OpenAiStream::new(chat_id, served);
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
                        yield Ok(OpenAiStream::error_event(&err.to_string()).to_bytes());
                        break;
                    }
                }
            }
            yield Ok(done_bytes());
        };
        Ok(sse_response(Body::from_stream(body)))
    } else {
        let (served, outcome) = state
            .fallback
            .run_collected(&model, dispatch)
            .await
            .map_err(ApiError::openai)?;
        let payload: Value = ChatCompletion {
            outcome: &outcome,
            model: &served,
            id: &chat_id,
        }
        .into();
        Ok(Json(payload).into_response())
    }
}
