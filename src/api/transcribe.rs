use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/transcribe/token", post(streaming_token))
        .route("/api/transcribe/assistant", post(assistant))
}

pub async fn streaming_token(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> impl IntoResponse {
    match state.transcriber.streaming_token().await {
        Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))),
        Err(e) => {
            error!("Failed to mint streaming transcription token: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate transcription token",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    #[serde(default)]
    pub prompt: String,
}

pub async fn assistant(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<AssistantRequest>,
) -> impl IntoResponse {
    if payload.prompt.is_empty() {
        return super::bad_request("Prompt is required");
    }

    match state.transcriber.assistant_reply(&payload.prompt).await {
        Ok(response) => (
            StatusCode::OK,
            Json(json!({ "prompt": payload.prompt, "response": response })),
        ),
        Err(e) => {
            error!("Assistant request failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate assistant response",
                    "details": e.to_string(),
                })),
            )
        }
    }
}
