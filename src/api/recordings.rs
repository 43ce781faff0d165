use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::shared::models::RecordingEntry;
use crate::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/recordings", post(save_recording).get(list_recordings))
}

/// Older clients send a single participant id, newer ones the full
/// roster. Both deserialize here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreatedBy {
    One(String),
    Many(Vec<String>),
}

impl CreatedBy {
    fn into_vec(self) -> Vec<String> {
        let ids = match self {
            CreatedBy::One(id) if id.is_empty() => Vec::new(),
            CreatedBy::One(id) => vec![id],
            CreatedBy::Many(ids) => ids,
        };
        if ids.is_empty() {
            vec!["system".to_string()]
        } else {
            ids
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecordingRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub recording_url: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<CreatedBy>,
}

pub async fn save_recording(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(payload): Json<SaveRecordingRequest>,
) -> impl IntoResponse {
    if let Some(response) = super::missing_fields(&[
        ("meetingId", !payload.meeting_id.is_empty()),
        ("recordingUrl", !payload.recording_url.is_empty()),
    ]) {
        return response;
    }

    let entry = RecordingEntry {
        recording_id: String::new(),
        call_id: payload
            .call_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| payload.meeting_id.clone()),
        meeting_id: payload.meeting_id,
        recording_url: payload.recording_url,
        started_at: payload.started_at,
        ended_at: payload.ended_at,
        created_by: payload
            .created_by
            .map(CreatedBy::into_vec)
            .unwrap_or_else(|| vec!["system".to_string()]),
        created_at: Utc::now(),
    };

    match state.store.save_recording(&entry).await {
        Ok(recording_id) => {
            info!("Recording {recording_id} saved for meeting {}", entry.meeting_id);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Recording saved successfully",
                    "recordingId": recording_id,
                })),
            )
        }
        Err(e) => {
            error!("Failed to save recording for {}: {e}", entry.meeting_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to save recording",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordingsQuery {
    pub created_by: Option<String>,
    pub meeting_id: Option<String>,
}

/// Lists recordings either for one meeting or across every meeting a
/// participant appeared in. `meetingId` wins when both are given.
pub async fn list_recordings(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<ListRecordingsQuery>,
) -> impl IntoResponse {
    let fetched = match (query.meeting_id.as_deref(), query.created_by.as_deref()) {
        (Some(meeting_id), _) if !meeting_id.is_empty() => {
            state.store.get_meeting_recordings(meeting_id).await
        }
        (_, Some(created_by)) if !created_by.is_empty() => {
            state.store.get_user_recordings(created_by).await
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": "createdBy or meetingId is required",
                    "recordings": [],
                })),
            )
        }
    };

    match fetched {
        Ok(recordings) => {
            let count = recordings.len();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "recordings": recordings, "count": count })),
            )
        }
        Err(e) => {
            error!("Failed to list recordings: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to retrieve recordings",
                    "recordings": [],
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_by_accepts_string_or_array() {
        let one: CreatedBy = serde_json::from_value(json!("u1")).unwrap();
        assert_eq!(one.into_vec(), vec!["u1".to_string()]);

        let many: CreatedBy = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(many.into_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_created_by_empty_falls_back_to_system() {
        assert_eq!(
            CreatedBy::One(String::new()).into_vec(),
            vec!["system".to_string()]
        );
        assert_eq!(
            CreatedBy::Many(Vec::new()).into_vec(),
            vec!["system".to_string()]
        );
    }

    #[test]
    fn test_save_request_defaults_call_id_handling() {
        let payload: SaveRecordingRequest = serde_json::from_value(json!({
            "meetingId": "m1",
            "recordingUrl": "https://cdn/rec.mp4",
        }))
        .unwrap();

        assert!(payload.call_id.is_none());
        assert!(payload.created_by.is_none());
        assert!(payload.started_at.is_none());
    }
}
