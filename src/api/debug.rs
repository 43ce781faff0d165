use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::MeetingFilter;
use crate::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/debug/health", get(health))
        .route("/api/debug/meetings", get(meetings))
}

/// Connectivity and collection diagnostics. Unauthenticated so probes
/// can hit it before any user exists.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database_health = state.store.health_check().await;
    let collections_check = match state.store.ensure_collections().await {
        Ok(audit) => json!(audit),
        Err(e) => json!({ "error": e.to_string() }),
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": database_health.is_healthy(),
            "databaseHealth": database_health,
            "collectionsCheck": collections_check,
            "collections": state.config.database.collections.all(),
            "timestamp": Utc::now(),
        })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugMeetingsQuery {
    pub action: Option<String>,
    pub user_id: Option<String>,
}

pub async fn meetings(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<DebugMeetingsQuery>,
) -> impl IntoResponse {
    match query.action.as_deref().unwrap_or("health") {
        "health" => {
            let health = state.store.health_check().await;
            (
                StatusCode::OK,
                Json(json!({ "success": true, "action": "health", "health": health })),
            )
        }
        "list" => match state.store.list_all_meetings().await {
            Ok(meetings) => {
                let count = meetings.len();
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "action": "list",
                        "meetings": meetings,
                        "count": count,
                    })),
                )
            }
            Err(e) => {
                error!("Debug meeting listing failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to list meetings", "details": e.to_string() })),
                )
            }
        },
        "user" => {
            let user_id = match query.user_id.as_deref() {
                Some(user_id) if !user_id.is_empty() => user_id,
                _ => return super::bad_request("userId is required for action=user"),
            };
            match state
                .store
                .get_user_meetings(user_id, None, MeetingFilter::All, 50)
                .await
            {
                Ok(meetings) => {
                    let count = meetings.len();
                    (
                        StatusCode::OK,
                        Json(json!({
                            "success": true,
                            "action": "user",
                            "userId": user_id,
                            "meetings": meetings,
                            "count": count,
                        })),
                    )
                }
                Err(e) => {
                    error!("Debug user meeting lookup failed for {user_id}: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "Failed to list meetings", "details": e.to_string() })),
                    )
                }
            }
        }
        _ => super::bad_request("Invalid action. Use health, list, or user"),
    }
}
