//! Model listing and health handlers.

use axum::Json;
use gembridge_client::CANONICAL_MODELS;
use serde_json::{Value, json};

/// Handles `GET /openai/v1/models`.
pub async fn list_openai_models() -> Json<Value> {
    let data: Vec<Value> = CANONICAL_MODELS
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": 0,
                "owned_by": "google",
            })
        })
        .collect();
    Json(json!({"object": "list", "data": data}))
}

/// Handles `GET /anthropic/v1/models`.
pub async fn list_anthropic_models() -> Json<Value> {
    let data: Vec<Value> = CANONICAL_MODELS
        .iter()
        .map(|id| {
            json!({
                "type": "model",
                "id": id,
                "display_name": id,
            })
        })
        .collect();
    Json(json!({"data": data, "has_more": false}))
}

/// Handles `GET /health`.
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
