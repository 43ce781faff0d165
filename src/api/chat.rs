use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{error, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::DbError;
use crate::shared::models::{ChatMessage, MessageType};
use crate::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat/save", post(save_messages))
        .route("/api/chat/history", get(chat_history))
        .route("/api/chat/delete", post(delete_message))
        .route("/api/chat/participants", get(active_participants))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    #[serde(default)]
    pub meeting_id: String,
    pub messages: Option<Vec<ChatMessagePayload>>,
}

fn build_message(meeting_id: &str, payload: ChatMessagePayload) -> ChatMessage {
    ChatMessage {
        message_id: String::new(),
        meeting_id: meeting_id.to_string(),
        sender_id: payload.sender_id,
        sender_name: payload.sender_name.unwrap_or_else(|| "Anonymous".to_string()),
        message: payload.message,
        message_type: payload
            .message_type
            .as_deref()
            .and_then(MessageType::parse)
            .unwrap_or_default(),
        timestamp: payload.timestamp.unwrap_or_else(Utc::now),
        is_private: payload.is_private,
        recipient_id: payload.recipient_id,
        file_url: payload.file_url,
        file_name: payload.file_name,
    }
}

/// Persists a batch of chat messages. Saves run concurrently and a
/// single failure does not abort the rest; the response carries the
/// per-batch counts either way.
pub async fn save_messages(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<SaveChatRequest>,
) -> impl IntoResponse {
    let messages = match payload.messages {
        Some(messages) if !payload.meeting_id.is_empty() => messages,
        _ => return super::bad_request("Invalid request data"),
    };

    let total_count = messages.len();
    let stored: Vec<ChatMessage> = messages
        .into_iter()
        .map(|item| build_message(&payload.meeting_id, item))
        .collect();
    let results = join_all(stored.iter().map(|m| state.store.save_chat_message(m))).await;

    let saved_count = results.iter().filter(|r| r.is_ok()).count();
    let failed_count = total_count - saved_count;
    if failed_count > 0 {
        warn!(
            "Saved {saved_count}/{total_count} chat message(s) for {}",
            payload.meeting_id
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "savedCount": saved_count,
            "failedCount": failed_count,
            "totalCount": total_count,
        })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryQuery {
    pub meeting_id: Option<String>,
    pub limit: Option<i64>,
    /// When present, narrows the history to the private thread between
    /// the caller and this peer.
    pub peer_id: Option<String>,
}

pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ChatHistoryQuery>,
) -> impl IntoResponse {
    let meeting_id = match query.meeting_id.as_deref() {
        Some(meeting_id) if !meeting_id.is_empty() => meeting_id,
        _ => return super::bad_request("Meeting ID is required"),
    };

    let fetched = match query.peer_id.as_deref() {
        Some(peer_id) => {
            state
                .store
                .get_private_messages(meeting_id, &user.user_id, peer_id)
                .await
        }
        None => {
            state
                .store
                .get_chat_messages(meeting_id, query.limit.unwrap_or(100))
                .await
        }
    };

    match fetched {
        Ok(messages) => {
            let count = messages.len();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "messages": messages, "count": count })),
            )
        }
        Err(e) => {
            error!("Failed to load chat history for {meeting_id}: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to retrieve chat messages" })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub meeting_id: String,
}

/// Deletes one message. Senders may delete their own; the meeting host
/// may delete anyone's.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<DeleteMessageRequest>,
) -> impl IntoResponse {
    if let Some(response) = super::missing_fields(&[
        ("messageId", !payload.message_id.is_empty()),
        ("meetingId", !payload.meeting_id.is_empty()),
    ]) {
        return response;
    }

    let is_host = match state.store.get_meeting(&payload.meeting_id).await {
        Ok(meeting) => meeting.map(|m| m.host_id == user.user_id).unwrap_or(false),
        Err(e) => {
            error!("Host lookup failed for {}: {e}", payload.meeting_id);
            false
        }
    };

    match state
        .store
        .delete_chat_message(&payload.message_id, &user.user_id, is_host)
        .await
    {
        Ok(deleted_count) => (
            StatusCode::OK,
            Json(json!({ "success": true, "deletedCount": deleted_count })),
        ),
        Err(DbError::NotFound(message)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
        }
        Err(DbError::Unauthorized(message)) => {
            (StatusCode::FORBIDDEN, Json(json!({ "error": message })))
        }
        Err(e) => {
            error!("Failed to delete message {}: {e}", payload.message_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to delete message", "details": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsQuery {
    pub meeting_id: Option<String>,
}

pub async fn active_participants(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<ParticipantsQuery>,
) -> impl IntoResponse {
    let meeting_id = match query.meeting_id.as_deref() {
        Some(meeting_id) if !meeting_id.is_empty() => meeting_id,
        _ => return super::bad_request("Meeting ID is required"),
    };

    match state.store.get_active_chat_participants(meeting_id).await {
        Ok(participants) => {
            let count = participants.len();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "participants": participants, "count": count })),
            )
        }
        Err(e) => {
            error!("Failed to list chat participants for {meeting_id}: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to retrieve chat participants" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ChatMessagePayload {
        ChatMessagePayload {
            sender_id: "u1".to_string(),
            sender_name: None,
            message: "hello".to_string(),
            message_type: None,
            timestamp: None,
            is_private: false,
            recipient_id: None,
            file_url: None,
            file_name: None,
        }
    }

    #[test]
    fn test_build_message_defaults() {
        let message = build_message("m1", payload());

        assert_eq!(message.meeting_id, "m1");
        assert_eq!(message.sender_name, "Anonymous");
        assert_eq!(message.message_type, MessageType::Text);
        assert!(message.message_id.is_empty());
    }

    #[test]
    fn test_build_message_keeps_explicit_fields() {
        let mut item = payload();
        item.sender_name = Some("Grace".to_string());
        item.message_type = Some("file".to_string());
        item.file_name = Some("notes.pdf".to_string());

        let message = build_message("m1", item);
        assert_eq!(message.sender_name, "Grace");
        assert_eq!(message.message_type, MessageType::File);
        assert_eq!(message.file_name.as_deref(), Some("notes.pdf"));
    }

    #[test]
    fn test_build_message_unknown_type_falls_back_to_text() {
        let mut item = payload();
        item.message_type = Some("sticker".to_string());

        let message = build_message("m1", item);
        assert_eq!(message.message_type, MessageType::Text);
    }
}
