use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states a meeting moves through. Stored and serialized in
/// lowercase to match the wire format the clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingStatus::Scheduled => write!(f, "scheduled"),
            MeetingStatus::Ongoing => write!(f, "ongoing"),
            MeetingStatus::Completed => write!(f, "completed"),
            MeetingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl MeetingStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(MeetingStatus::Scheduled),
            "ongoing" => Some(MeetingStatus::Ongoing),
            "completed" => Some(MeetingStatus::Completed),
            "cancelled" => Some(MeetingStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub meeting_id: String,
    pub host_id: String,
    pub host_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub guests: Vec<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_notification_time")]
    pub notification_time: u32,
    pub status: MeetingStatus,
    #[serde(default)]
    pub meeting_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_notification_time() -> u32 {
    15
}

/// A meeting as returned by the listing endpoint, annotated with the
/// fields the dashboard computes per caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingView {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub is_host: bool,
    pub is_upcoming: bool,
    pub is_past: bool,
    /// Whole days until start; null once the meeting has begun.
    pub time_until_start: Option<i64>,
}

impl MeetingView {
    pub fn annotate(meeting: Meeting, user_id: &str, now: DateTime<Utc>) -> Self {
        let is_upcoming = meeting.start_time > now;
        let time_until_start = if is_upcoming {
            Some((meeting.start_time - now).num_days())
        } else {
            None
        };
        Self {
            is_host: meeting.host_id == user_id,
            is_upcoming,
            is_past: !is_upcoming,
            time_until_start,
            meeting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    File,
    Reaction,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Text => write!(f, "text"),
            MessageType::File => write!(f, "file"),
            MessageType::Reaction => write!(f, "reaction"),
        }
    }
}

impl MessageType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageType::Text),
            "file" => Some(MessageType::File),
            "reaction" => Some(MessageType::Reaction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Generated by the store on first save when empty.
    #[serde(default)]
    pub message_id: String,
    pub meeting_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingEntry {
    /// Generated by the store on save when empty.
    #[serde(default)]
    pub recording_id: String,
    pub meeting_id: String,
    pub call_id: String,
    pub recording_url: String,
    /// The vendor omits these while the artifact is still processing.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Participant identifiers present during capture.
    #[serde(default)]
    pub created_by: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One send outcome per invited guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub guest_email: String,
}

impl EmailOutcome {
    pub fn sent(guest_email: &str, message_id: String) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            error: None,
            guest_email: guest_email.to_string(),
        }
    }

    pub fn failed(guest_email: &str, error: String) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error),
            guest_email: guest_email.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// `successful/total` formatted to one decimal place, e.g. `"50.0%"`.
    pub success_rate: String,
}

impl InvitationStats {
    pub fn from_outcomes(outcomes: &[EmailOutcome]) -> Self {
        let total = outcomes.len();
        let successful = outcomes.iter().filter(|o| o.success).count();
        let failed = total - successful;
        let success_rate = if total == 0 {
            "0.0%".to_string()
        } else {
            format!("{:.1}%", successful as f64 / total as f64 * 100.0)
        };
        Self {
            total,
            successful,
            failed,
            success_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRecord {
    pub meeting_id: String,
    pub host_id: String,
    pub host_name: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub guest_emails: Vec<String>,
    pub email_results: Vec<EmailOutcome>,
    pub sent_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: String,
    pub meeting_id: String,
    pub user_id: String,
    pub user_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}
