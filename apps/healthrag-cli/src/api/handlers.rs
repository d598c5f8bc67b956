use axum::{Json, extract::State, extract::rejection::JsonRejection};
use std::sync::Arc;

use healthrag_core::types::Query;

use super::dto::*;
use super::error::ApiError;
use super::state::AppState;

/// POST /chat - Answer a health question
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = body?;
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }

    let answer = state.pipeline.answer(&Query::new(message)).await.map_err(|e| {
        tracing::error!(error = %e, "chat request failed");
        ApiError::from(e)
    })?;

    Ok(Json(ChatResponse { response: answer.text }))
}

/// GET /health - Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
