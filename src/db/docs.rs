use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};

use crate::shared::models::{
    ChatMessage, ChatSession, EmailOutcome, InvitationRecord, Meeting, MeetingStatus, MessageType,
    RecordingEntry,
};

/// Conversions between the wire-facing models and the stored documents.
///
/// The models serialize to camelCase JSON for HTTP responses; the documents
/// keep the same key names so a collection written by either side reads back
/// identically. Dates cross the boundary as BSON datetimes, not strings, so
/// range filters on `startTime`/`timestamp` keep working.

fn bson_date(value: DateTime<Utc>) -> Bson {
    Bson::DateTime(BsonDateTime::from_chrono(value))
}

fn opt_bson_date(value: &Option<DateTime<Utc>>) -> Bson {
    match value {
        Some(v) => bson_date(*v),
        None => Bson::Null,
    }
}

fn opt_bson_str(value: &Option<String>) -> Bson {
    match value {
        Some(v) => Bson::String(v.clone()),
        None => Bson::Null,
    }
}

fn str_field(doc: &Document, key: &str) -> String {
    doc.get_str(key).unwrap_or_default().to_string()
}

fn opt_str_field(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key).ok().map(str::to_owned)
}

fn bool_field(doc: &Document, key: &str, default: bool) -> bool {
    doc.get_bool(key).unwrap_or(default)
}

fn date_field(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get_datetime(key).ok().map(|dt| dt.to_chrono())
}

/// Documents written by earlier deployments may carry numeric fields as
/// int32, int64 or double; accept all three.
fn uint_field(doc: &Document, key: &str, default: u32) -> u32 {
    match doc.get(key) {
        Some(Bson::Int32(v)) if *v >= 0 => *v as u32,
        Some(Bson::Int64(v)) if *v >= 0 => *v as u32,
        Some(Bson::Double(v)) if *v >= 0.0 => *v as u32,
        _ => default,
    }
}

fn string_array_field(doc: &Document, key: &str) -> Vec<String> {
    doc.get_array(key)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

pub fn meeting_to_document(meeting: &Meeting) -> Document {
    doc! {
        "meetingId": &meeting.meeting_id,
        "hostId": &meeting.host_id,
        "hostName": &meeting.host_name,
        "title": &meeting.title,
        "description": &meeting.description,
        "startTime": bson_date(meeting.start_time),
        "endTime": bson_date(meeting.end_time),
        "guests": &meeting.guests,
        "timezone": &meeting.timezone,
        "notificationTime": meeting.notification_time as i32,
        "status": meeting.status.to_string(),
        "meetingUrl": &meeting.meeting_url,
        "createdAt": bson_date(meeting.created_at),
        "updatedAt": bson_date(meeting.updated_at),
    }
}

pub fn meeting_from_document(doc: &Document) -> Meeting {
    let now = Utc::now();
    Meeting {
        meeting_id: str_field(doc, "meetingId"),
        host_id: str_field(doc, "hostId"),
        host_name: str_field(doc, "hostName"),
        title: str_field(doc, "title"),
        description: str_field(doc, "description"),
        start_time: date_field(doc, "startTime").unwrap_or(now),
        end_time: date_field(doc, "endTime").unwrap_or(now),
        guests: string_array_field(doc, "guests"),
        timezone: match doc.get_str("timezone") {
            Ok(tz) => tz.to_string(),
            Err(_) => "UTC".to_string(),
        },
        notification_time: uint_field(doc, "notificationTime", 15),
        status: doc
            .get_str("status")
            .ok()
            .and_then(MeetingStatus::parse)
            .unwrap_or(MeetingStatus::Scheduled),
        meeting_url: str_field(doc, "meetingUrl"),
        created_at: date_field(doc, "createdAt").unwrap_or(now),
        updated_at: date_field(doc, "updatedAt").unwrap_or(now),
    }
}

pub fn message_to_document(message: &ChatMessage) -> Document {
    doc! {
        "messageId": &message.message_id,
        "meetingId": &message.meeting_id,
        "senderId": &message.sender_id,
        "senderName": &message.sender_name,
        "message": &message.message,
        "messageType": message.message_type.to_string(),
        "timestamp": bson_date(message.timestamp),
        "isPrivate": message.is_private,
        "recipientId": opt_bson_str(&message.recipient_id),
        "fileUrl": opt_bson_str(&message.file_url),
        "fileName": opt_bson_str(&message.file_name),
    }
}

pub fn message_from_document(doc: &Document) -> ChatMessage {
    ChatMessage {
        message_id: str_field(doc, "messageId"),
        meeting_id: str_field(doc, "meetingId"),
        sender_id: str_field(doc, "senderId"),
        sender_name: str_field(doc, "senderName"),
        message: str_field(doc, "message"),
        message_type: doc
            .get_str("messageType")
            .ok()
            .and_then(MessageType::parse)
            .unwrap_or(MessageType::Text),
        timestamp: date_field(doc, "timestamp").unwrap_or_else(Utc::now),
        is_private: bool_field(doc, "isPrivate", false),
        recipient_id: opt_str_field(doc, "recipientId"),
        file_url: opt_str_field(doc, "fileUrl"),
        file_name: opt_str_field(doc, "fileName"),
    }
}

pub fn recording_to_document(recording: &RecordingEntry) -> Document {
    doc! {
        "recordingId": &recording.recording_id,
        "meetingId": &recording.meeting_id,
        "callId": &recording.call_id,
        "recordingUrl": &recording.recording_url,
        "startedAt": opt_bson_date(&recording.started_at),
        "endedAt": opt_bson_date(&recording.ended_at),
        "createdBy": &recording.created_by,
        "createdAt": bson_date(recording.created_at),
    }
}

pub fn recording_from_document(doc: &Document) -> RecordingEntry {
    RecordingEntry {
        recording_id: str_field(doc, "recordingId"),
        meeting_id: str_field(doc, "meetingId"),
        call_id: str_field(doc, "callId"),
        recording_url: str_field(doc, "recordingUrl"),
        started_at: date_field(doc, "startedAt"),
        ended_at: date_field(doc, "endedAt"),
        created_by: string_array_field(doc, "createdBy"),
        created_at: date_field(doc, "createdAt").unwrap_or_else(Utc::now),
    }
}

pub fn session_to_document(session: &ChatSession) -> Document {
    doc! {
        "sessionId": &session.session_id,
        "meetingId": &session.meeting_id,
        "userId": &session.user_id,
        "userName": &session.user_name,
        "joinedAt": bson_date(session.joined_at),
        "lastActivity": bson_date(session.last_activity),
        "isActive": session.is_active,
    }
}

pub fn session_from_document(doc: &Document) -> ChatSession {
    ChatSession {
        session_id: str_field(doc, "sessionId"),
        meeting_id: str_field(doc, "meetingId"),
        user_id: str_field(doc, "userId"),
        user_name: str_field(doc, "userName"),
        joined_at: date_field(doc, "joinedAt").unwrap_or_else(Utc::now),
        last_activity: date_field(doc, "lastActivity").unwrap_or_else(Utc::now),
        is_active: bool_field(doc, "isActive", false),
    }
}

fn outcome_to_document(outcome: &EmailOutcome) -> Document {
    doc! {
        "success": outcome.success,
        "messageId": opt_bson_str(&outcome.message_id),
        "error": opt_bson_str(&outcome.error),
        "guestEmail": &outcome.guest_email,
    }
}

fn outcome_from_document(doc: &Document) -> EmailOutcome {
    EmailOutcome {
        success: bool_field(doc, "success", false),
        message_id: opt_str_field(doc, "messageId"),
        error: opt_str_field(doc, "error"),
        guest_email: str_field(doc, "guestEmail"),
    }
}

pub fn invitation_to_document(record: &InvitationRecord) -> Document {
    doc! {
        "meetingId": &record.meeting_id,
        "hostId": &record.host_id,
        "hostName": &record.host_name,
        "title": &record.title,
        "startTime": bson_date(record.start_time),
        "endTime": bson_date(record.end_time),
        "description": &record.description,
        "guestEmails": &record.guest_emails,
        "emailResults": record
            .email_results
            .iter()
            .map(outcome_to_document)
            .map(Bson::Document)
            .collect::<Vec<_>>(),
        "sentAt": bson_date(record.sent_at),
        "status": &record.status,
    }
}

pub fn invitation_from_document(doc: &Document) -> InvitationRecord {
    let now = Utc::now();
    InvitationRecord {
        meeting_id: str_field(doc, "meetingId"),
        host_id: str_field(doc, "hostId"),
        host_name: str_field(doc, "hostName"),
        title: str_field(doc, "title"),
        start_time: date_field(doc, "startTime").unwrap_or(now),
        end_time: date_field(doc, "endTime").unwrap_or(now),
        description: str_field(doc, "description"),
        guest_emails: string_array_field(doc, "guestEmails"),
        email_results: doc
            .get_array("emailResults")
            .map(|items| {
                items
                    .iter()
                    .filter_map(Bson::as_document)
                    .map(outcome_from_document)
                    .collect()
            })
            .unwrap_or_default(),
        sent_at: date_field(doc, "sentAt").unwrap_or(now),
        status: str_field(doc, "status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_meeting() -> Meeting {
        Meeting {
            meeting_id: "meeting_42".to_string(),
            host_id: "host_1".to_string(),
            host_name: "Ada".to_string(),
            title: "Weekly sync".to_string(),
            description: "Agenda in doc".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 2, 15, 0, 0).unwrap(),
            guests: vec!["a@example.com".to_string()],
            timezone: "Europe/Lisbon".to_string(),
            notification_time: 30,
            status: MeetingStatus::Scheduled,
            meeting_url: "http://localhost:3000/meeting/meeting_42".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_meeting_document_round_trip() {
        let meeting = sample_meeting();
        let restored = meeting_from_document(&meeting_to_document(&meeting));

        assert_eq!(restored.meeting_id, meeting.meeting_id);
        assert_eq!(restored.start_time, meeting.start_time);
        assert_eq!(restored.guests, meeting.guests);
        assert_eq!(restored.notification_time, 30);
        assert_eq!(restored.status, MeetingStatus::Scheduled);
    }

    #[test]
    fn test_meeting_from_sparse_document_applies_defaults() {
        let doc = doc! { "meetingId": "m1", "hostId": "h1", "title": "t" };
        let meeting = meeting_from_document(&doc);

        assert_eq!(meeting.timezone, "UTC");
        assert_eq!(meeting.notification_time, 15);
        assert_eq!(meeting.status, MeetingStatus::Scheduled);
        assert!(meeting.guests.is_empty());
        assert!(meeting.description.is_empty());
    }

    #[test]
    fn test_uint_field_accepts_legacy_double() {
        let doc = doc! { "notificationTime": 10.0 };
        assert_eq!(uint_field(&doc, "notificationTime", 15), 10);
        let doc = doc! { "notificationTime": -3_i32 };
        assert_eq!(uint_field(&doc, "notificationTime", 15), 15);
    }

    #[test]
    fn test_message_document_keeps_privacy_fields() {
        let message = ChatMessage {
            message_id: "m_1".to_string(),
            meeting_id: "meeting_42".to_string(),
            sender_id: "u1".to_string(),
            sender_name: "Ada".to_string(),
            message: "psst".to_string(),
            message_type: MessageType::Text,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 14, 5, 0).unwrap(),
            is_private: true,
            recipient_id: Some("u2".to_string()),
            file_url: None,
            file_name: None,
        };

        let doc = message_to_document(&message);
        assert_eq!(doc.get_bool("isPrivate").unwrap(), true);
        assert_eq!(doc.get_str("recipientId").unwrap(), "u2");
        assert_eq!(doc.get("fileUrl"), Some(&Bson::Null));

        let restored = message_from_document(&doc);
        assert_eq!(restored.recipient_id.as_deref(), Some("u2"));
        assert_eq!(restored.message_type, MessageType::Text);
    }

    #[test]
    fn test_invitation_round_trip_keeps_outcomes() {
        let record = InvitationRecord {
            meeting_id: "meeting_42".to_string(),
            host_id: "h1".to_string(),
            host_name: "Ada".to_string(),
            title: "Weekly sync".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 2, 15, 0, 0).unwrap(),
            description: String::new(),
            guest_emails: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            email_results: vec![
                EmailOutcome::sent("a@example.com", "<id1@wismeet>".to_string()),
                EmailOutcome::failed("b@example.com", "mailbox full".to_string()),
            ],
            sent_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            status: "sent".to_string(),
        };

        let restored = invitation_from_document(&invitation_to_document(&record));
        assert_eq!(restored.email_results.len(), 2);
        assert!(restored.email_results[0].success);
        assert_eq!(
            restored.email_results[1].error.as_deref(),
            Some("mailbox full")
        );
    }
}
