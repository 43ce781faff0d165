use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::MeetingFilter;
use crate::email::MeetingInvite;
use crate::room;
use crate::shared::models::{
    InvitationRecord, InvitationStats, Meeting, MeetingStatus, MeetingView,
};
use crate::shared::state::AppState;

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/meetings/save", post(save_meeting))
        .route("/api/meetings/get", get(get_meetings))
        .route("/api/meetings/send-invitations", post(send_invitations))
        .route("/api/meetings/invitations", get(invitation_history))
        .route("/api/meetings/send-summary", post(send_summary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMeetingRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub host_id: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub guests: Vec<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub notification_time: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SaveMeetingRequest {
    /// Validates the required fields and builds the meeting to store.
    /// Err carries the wire names of whatever was absent.
    fn into_meeting(self, meeting_url: String, now: DateTime<Utc>) -> Result<Meeting, Vec<&'static str>> {
        let mut missing = Vec::new();
        if self.meeting_id.is_empty() {
            missing.push("meetingId");
        }
        if self.host_id.is_empty() {
            missing.push("hostId");
        }
        if self.host_name.is_empty() {
            missing.push("hostName");
        }
        if self.title.is_empty() {
            missing.push("title");
        }
        let start_time = match self.start_time {
            Some(start) => start,
            None => {
                missing.push("startTime");
                now
            }
        };
        let end_time = match self.end_time {
            Some(end) => end,
            None => {
                missing.push("endTime");
                now
            }
        };
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(Meeting {
            meeting_id: self.meeting_id,
            host_id: self.host_id,
            host_name: self.host_name,
            title: self.title,
            description: self.description,
            start_time,
            end_time,
            guests: self.guests,
            timezone: self.timezone.unwrap_or_else(|| "UTC".to_string()),
            notification_time: self.notification_time.unwrap_or(15),
            status: self
                .status
                .as_deref()
                .and_then(MeetingStatus::parse)
                .unwrap_or(MeetingStatus::Scheduled),
            meeting_url,
            created_at: now,
            updated_at: now,
        })
    }
}

pub async fn save_meeting(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<SaveMeetingRequest>,
) -> impl IntoResponse {
    let meeting_url = state.config.meeting_url(&payload.meeting_id);
    let meeting = match payload.into_meeting(meeting_url.clone(), Utc::now()) {
        Ok(meeting) => meeting,
        Err(missing) => return super::missing_fields_named(&missing),
    };

    match state.store.save_meeting(&meeting).await {
        Ok(stored) => {
            info!("Meeting {} saved by {}", stored.meeting_id, user.user_id);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Meeting saved successfully",
                    "data": stored,
                    "meetingUrl": meeting_url,
                })),
            )
        }
        Err(e) => {
            error!("Failed to save meeting: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to save meeting", "details": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetMeetingsQuery {
    pub filter: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_meetings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<GetMeetingsQuery>,
) -> impl IntoResponse {
    let filter = MeetingFilter::parse(query.filter.as_deref().unwrap_or("all"));
    let limit = query.limit.unwrap_or(10);
    let email = if user.email.is_empty() {
        None
    } else {
        Some(user.email.as_str())
    };

    match state
        .store
        .get_user_meetings(&user.user_id, email, filter, limit)
        .await
    {
        Ok(meetings) => {
            let now = Utc::now();
            let views: Vec<MeetingView> = meetings
                .into_iter()
                .map(|meeting| MeetingView::annotate(meeting, &user.user_id, now))
                .collect();
            let count = views.len();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "meetings": views,
                    "count": count,
                    "filter": filter.as_str(),
                    "userId": user.user_id,
                })),
            )
        }
        Err(e) => {
            error!("Failed to list meetings for {}: {e}", user.user_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInvitationsRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub guest_emails: Vec<String>,
    #[serde(default)]
    pub host_name: String,
}

pub async fn send_invitations(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<SendInvitationsRequest>,
) -> impl IntoResponse {
    let start_time = match payload.start_time {
        Some(start)
            if !payload.meeting_id.is_empty()
                && !payload.title.is_empty()
                && !payload.guest_emails.is_empty()
                && !payload.host_name.is_empty() =>
        {
            start
        }
        _ => {
            return super::bad_request(
                "Meeting ID, title, start time, guest emails, and host name are required",
            )
        }
    };

    if let Err(e) = state.email.verify().await {
        error!("Email transport verification failed: {e}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Email service not configured properly",
                "details": e.to_string(),
            })),
        );
    }

    let end_time = payload
        .end_time
        .unwrap_or_else(|| room::default_end_time(start_time));
    let meeting_link = state.config.meeting_url(&payload.meeting_id);
    let invite = MeetingInvite {
        title: payload.title.clone(),
        host_name: payload.host_name.clone(),
        start_time,
        end_time,
        description: payload.description.clone(),
        meeting_link: meeting_link.clone(),
    };

    let results = state
        .email
        .send_invitations(&invite, &payload.guest_emails)
        .await;
    let statistics = InvitationStats::from_outcomes(&results);

    // The audit record is secondary; losing it must not turn an
    // already-sent batch into an error response.
    let record = InvitationRecord {
        meeting_id: payload.meeting_id.clone(),
        host_id: user.user_id.clone(),
        host_name: payload.host_name,
        title: payload.title,
        start_time,
        end_time,
        description: payload.description,
        guest_emails: payload.guest_emails,
        email_results: results.clone(),
        sent_at: Utc::now(),
        status: "sent".to_string(),
    };
    if let Err(e) = state.store.save_invitation_record(&record).await {
        warn!(
            "Could not record invitation history for {}: {e}",
            record.meeting_id
        );
    }

    info!(
        "Sent {} of {} invitation(s) for meeting {}",
        statistics.successful, statistics.total, record.meeting_id
    );
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Invitations sent successfully",
            "statistics": statistics,
            "results": results,
            "meetingLink": meeting_link,
        })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationHistoryQuery {
    pub meeting_id: Option<String>,
    pub host_id: Option<String>,
}

pub async fn invitation_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<InvitationHistoryQuery>,
) -> impl IntoResponse {
    let meeting_id = match query.meeting_id.as_deref() {
        Some(meeting_id) if !meeting_id.is_empty() => meeting_id,
        _ => return super::bad_request("Meeting ID is required"),
    };
    let host_id = query.host_id.as_deref().unwrap_or(&user.user_id);

    match state.store.get_invitation_history(meeting_id, host_id).await {
        Ok(invitations) => (
            StatusCode::OK,
            Json(json!({ "success": true, "invitations": invitations })),
        ),
        Err(e) => {
            error!("Failed to fetch invitation history for {meeting_id}: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch invitation history" })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSummaryRequest {
    #[serde(default)]
    pub meeting_id: String,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Sends the post-meeting summary email at most once per meeting end:
/// the dispatch ledger is reserved first, so a concurrent duplicate
/// request reports `alreadySent` instead of mailing twice.
pub async fn send_summary(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<SendSummaryRequest>,
) -> impl IntoResponse {
    if let Some(response) = super::missing_fields(&[
        ("meetingId", !payload.meeting_id.is_empty()),
        ("subject", !payload.subject.is_empty()),
        ("html", !payload.html.is_empty()),
        ("recipients", !payload.recipients.is_empty()),
    ]) {
        return response;
    }
    let end_time = payload.end_time.unwrap_or_else(Utc::now);

    match state
        .store
        .record_summary_dispatch(&payload.meeting_id, end_time)
        .await
    {
        Ok(false) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "alreadySent": true,
                "message": "Summary already sent for this meeting",
            })),
        ),
        Ok(true) => match state
            .email
            .send_summary(&payload.recipients, &payload.subject, &payload.html)
            .await
        {
            Ok(message_id) => {
                info!(
                    "Summary for meeting {} sent by {} to {} recipient(s)",
                    payload.meeting_id,
                    user.user_id,
                    payload.recipients.len()
                );
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "message": "Summary email sent",
                        "messageId": message_id,
                    })),
                )
            }
            Err(e) => {
                error!("Failed to send summary for {}: {e}", payload.meeting_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to send summary email",
                        "details": e.to_string(),
                    })),
                )
            }
        },
        Err(e) => {
            error!(
                "Summary dispatch check failed for {}: {e}",
                payload.meeting_id
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": e.to_string() })),
            )
        }
    }
}
