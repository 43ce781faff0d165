use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::reconcile::Reconciler;
use crate::shared::state::AppState;
use crate::stream::{ChatUser, ParticipantProfile, StreamError};

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stream/chat-token", post(chat_token))
        .route("/api/stream/create-users", post(create_users))
        .route("/api/stream/join-channel", post(join_channel))
        .route("/api/stream/sync-participants", post(sync_participants))
}

fn not_configured() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": StreamError::NotConfigured.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTokenRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_image: Option<String>,
}

/// Upserts the chat-side user and mints the token their client
/// connects with.
pub async fn chat_token(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<ChatTokenRequest>,
) -> impl IntoResponse {
    if !state.chat.is_configured() {
        return not_configured();
    }
    if payload.user_id.is_empty() {
        return super::bad_request("User ID is required");
    }

    let chat_user = ChatUser {
        id: payload.user_id.clone(),
        name: payload
            .user_name
            .clone()
            .unwrap_or_else(|| payload.user_id.clone()),
        image: payload.user_image.clone(),
    };
    let minted = match state.chat.upsert_user(&chat_user).await {
        Ok(()) => state.chat.user_token(&payload.user_id),
        Err(e) => Err(e),
    };

    match minted {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({
                "token": token,
                "userId": chat_user.id,
                "userName": chat_user.name,
                "userImage": chat_user.image,
            })),
        ),
        Err(e) => {
            error!("Chat token generation failed for {}: {e}", payload.user_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate chat token",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUsersRequest {
    pub participants: Option<Vec<ParticipantProfile>>,
}

pub async fn create_users(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<CreateUsersRequest>,
) -> impl IntoResponse {
    if !state.chat.is_configured() {
        return not_configured();
    }
    let participants = match payload.participants {
        Some(participants) => participants,
        None => return super::bad_request("Participants array is required"),
    };

    let report = state.chat.ensure_users(&participants).await;
    let processed = report.created_users.len();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "createdUsers": report.created_users,
            "errors": report.errors,
            "message": format!("Successfully processed {processed} participants"),
        })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinChannelRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub meeting_id: String,
}

pub async fn join_channel(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<JoinChannelRequest>,
) -> impl IntoResponse {
    if !state.chat.is_configured() {
        return not_configured();
    }
    if payload.user_id.is_empty() || payload.meeting_id.is_empty() {
        return super::bad_request("User ID and Meeting ID are required");
    }

    match state
        .chat
        .join_channel(&payload.meeting_id, &payload.user_id)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": outcome.message(),
                "userId": payload.user_id,
                "meetingId": payload.meeting_id,
            })),
        ),
        Err(e) => {
            error!(
                "Could not join {} to channel {}: {e}",
                payload.user_id, payload.meeting_id
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to create or join any chat channel",
                    "details": "Please check Stream Chat permissions and try again",
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncParticipantsRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub participants: Vec<ParticipantProfile>,
}

/// One-shot reconciliation pass for callers that do not hold a live
/// room session.
pub async fn sync_participants(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<SyncParticipantsRequest>,
) -> impl IntoResponse {
    if !state.chat.is_configured() {
        return not_configured();
    }
    if payload.meeting_id.is_empty() {
        return super::bad_request("Meeting ID is required");
    }

    let reconciler = Reconciler::new(state.chat.clone(), payload.meeting_id.clone());
    reconciler.update_roster(payload.participants).await;
    match reconciler.sync_once().await {
        Ok(report) => {
            let in_sync = report.in_sync();
            if !in_sync {
                info!(
                    "Synced {} participant(s) into channel {}",
                    report.added.len(),
                    payload.meeting_id
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "added": report.added,
                    "errors": report.errors,
                    "inSync": in_sync,
                })),
            )
        }
        Err(e) => {
            error!("Participant sync failed for {}: {e}", payload.meeting_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to sync participants",
                    "details": e.to_string(),
                })),
            )
        }
    }
}
