pub mod docs;
pub mod sanitize;

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Serialize;

use crate::config::{CollectionNames, DatabaseConfig};
use crate::shared::ids;
use crate::shared::models::{
    ChatMessage, ChatSession, InvitationRecord, Meeting, MeetingStatus, RecordingEntry,
};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a chat session counts as present after its last activity.
const ACTIVE_SESSION_WINDOW: chrono::Duration = chrono::Duration::minutes(5);

#[derive(Debug, Clone)]
pub enum DbError {
    ConnectionFailed(String),
    QueryFailed(String),
    NotFound(String),
    Unauthorized(String),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(e) => write!(f, "Database connection failed: {e}"),
            Self::QueryFailed(e) => write!(f, "Database query failed: {e}"),
            Self::NotFound(what) => write!(f, "{what}"),
            Self::Unauthorized(why) => write!(f, "{why}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        DbError::QueryFailed(err.to_string())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000
    )
}

/// Which slice of a user's meetings a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingFilter {
    All,
    Upcoming,
    Past,
}

impl MeetingFilter {
    /// Unknown filter values fall back to `All`, matching the listing
    /// endpoint's lenient query parsing.
    pub fn parse(value: &str) -> Self {
        match value {
            "upcoming" => MeetingFilter::Upcoming,
            "past" => MeetingFilter::Past,
            _ => MeetingFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingFilter::All => "all",
            MeetingFilter::Upcoming => "upcoming",
            MeetingFilter::Past => "past",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DatabaseHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Result of the startup collection audit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionAudit {
    pub existing_collections: Vec<String>,
    pub required_collections: Vec<String>,
    pub missing_collections: Vec<String>,
}

/// Persistence facade over the meeting database.
///
/// Every operation returns `Result<T, DbError>`; driver errors never
/// escape as panics. Listing operations yield empty vectors when nothing
/// matches. Writes sanitize their documents first so unset optional
/// fields are not stored as nulls.
pub struct MeetingStore {
    db: Database,
    collections: CollectionNames,
}

impl MeetingStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.retry_writes = Some(true);
        options.retry_reads = Some(true);

        let client =
            Client::with_options(options).map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        let db = client.database(&config.database);

        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        info!("Connected to database {}", config.database);

        Ok(Self {
            db,
            collections: config.collections.clone(),
        })
    }

    fn meetings(&self) -> Collection<Document> {
        self.db.collection(&self.collections.meetings)
    }

    fn messages(&self) -> Collection<Document> {
        self.db.collection(&self.collections.messages)
    }

    fn chat_sessions(&self) -> Collection<Document> {
        self.db.collection(&self.collections.chat_sessions)
    }

    fn invitations(&self) -> Collection<Document> {
        self.db.collection(&self.collections.invitations)
    }

    fn summaries(&self) -> Collection<Document> {
        self.db.collection(&self.collections.summaries)
    }

    fn recordings(&self) -> Collection<Document> {
        self.db.collection(&self.collections.recordings)
    }

    async fn collect_meetings(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Meeting>, DbError> {
        let cursor = self.meetings().find(filter, options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.iter().map(docs::meeting_from_document).collect())
    }

    /// Inserts a meeting, stamping creation and update times at write.
    /// Returns the stored copy so callers can echo it back.
    pub async fn save_meeting(&self, meeting: &Meeting) -> Result<Meeting, DbError> {
        let mut stored = meeting.clone();
        let now = Utc::now();
        stored.created_at = now;
        stored.updated_at = now;

        let doc = sanitize::strip_nulls(docs::meeting_to_document(&stored));
        self.meetings().insert_one(doc, None).await?;
        info!("Meeting saved: {}", stored.meeting_id);
        Ok(stored)
    }

    /// Meetings where the user is the host or appears in the guest list,
    /// by identifier or by email when one is known. Upcoming meetings
    /// sort soonest first, past meetings newest first.
    pub async fn get_user_meetings(
        &self,
        user_id: &str,
        email: Option<&str>,
        filter: MeetingFilter,
        limit: i64,
    ) -> Result<Vec<Meeting>, DbError> {
        let mut access = vec![
            doc! { "hostId": user_id },
            doc! { "guests": { "$in": [user_id] } },
        ];
        if let Some(email) = email {
            access.push(doc! { "guests": { "$in": [email] } });
        }

        let now = BsonDateTime::from_chrono(Utc::now());
        let mut query = doc! { "$or": access };
        let sort = match filter {
            MeetingFilter::Upcoming => {
                query.insert("startTime", doc! { "$gte": now });
                doc! { "startTime": 1 }
            }
            MeetingFilter::Past => {
                query.insert("startTime", doc! { "$lt": now });
                doc! { "startTime": -1 }
            }
            MeetingFilter::All => doc! { "startTime": 1 },
        };

        let options = FindOptions::builder().sort(sort).limit(limit).build();
        self.collect_meetings(query, options).await
    }

    pub async fn get_meeting(&self, meeting_id: &str) -> Result<Option<Meeting>, DbError> {
        let doc = self
            .meetings()
            .find_one(doc! { "meetingId": meeting_id }, None)
            .await?;
        Ok(doc.as_ref().map(docs::meeting_from_document))
    }

    /// Returns the number of documents modified (zero when the meeting
    /// does not exist).
    pub async fn update_meeting_status(
        &self,
        meeting_id: &str,
        status: MeetingStatus,
    ) -> Result<u64, DbError> {
        let result = self
            .meetings()
            .update_one(
                doc! { "meetingId": meeting_id },
                doc! { "$set": {
                    "status": status.to_string(),
                    "updatedAt": BsonDateTime::from_chrono(Utc::now()),
                } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    /// Diagnostic listing of every meeting, newest first.
    pub async fn list_all_meetings(&self) -> Result<Vec<Meeting>, DbError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();
        self.collect_meetings(doc! {}, options).await
    }

    /// Persists one chat message. The stored identifier is always
    /// generated here; any identifier on the payload is ignored.
    pub async fn save_chat_message(&self, message: &ChatMessage) -> Result<String, DbError> {
        let message_id = ids::message_id(&message.meeting_id);
        let mut doc = docs::message_to_document(message);
        doc.insert("messageId", &message_id);
        doc.insert("createdAt", BsonDateTime::from_chrono(Utc::now()));

        self.messages()
            .insert_one(sanitize::strip_nulls(doc), None)
            .await?;
        Ok(message_id)
    }

    /// The newest `limit` public messages of a meeting, returned in
    /// chronological order. No messages is a normal empty result.
    pub async fn get_chat_messages(
        &self,
        meeting_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, DbError> {
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .limit(limit)
            .build();
        let cursor = self
            .messages()
            .find(
                doc! { "meetingId": meeting_id, "isPrivate": false },
                options,
            )
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;

        let mut messages: Vec<ChatMessage> =
            docs.iter().map(docs::message_from_document).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Private messages exchanged between two participants of a meeting,
    /// both directions, chronological.
    pub async fn get_private_messages(
        &self,
        meeting_id: &str,
        user_id: &str,
        peer_id: &str,
    ) -> Result<Vec<ChatMessage>, DbError> {
        let query = doc! {
            "meetingId": meeting_id,
            "isPrivate": true,
            "$or": [
                { "senderId": user_id, "recipientId": peer_id },
                { "senderId": peer_id, "recipientId": user_id },
            ],
        };
        let options = FindOptions::builder().sort(doc! { "timestamp": 1 }).build();
        let cursor = self.messages().find(query, options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.iter().map(docs::message_from_document).collect())
    }

    /// Deletes a message if the requester sent it or hosts the meeting.
    pub async fn delete_chat_message(
        &self,
        message_id: &str,
        requester_id: &str,
        is_host: bool,
    ) -> Result<u64, DbError> {
        let message = self
            .messages()
            .find_one(doc! { "messageId": message_id }, None)
            .await?
            .ok_or_else(|| DbError::NotFound("Message not found".to_string()))?;

        let sender_id = message.get_str("senderId").unwrap_or_default();
        if sender_id != requester_id && !is_host {
            return Err(DbError::Unauthorized(
                "Unauthorized to delete this message".to_string(),
            ));
        }

        let result = self
            .messages()
            .delete_one(doc! { "messageId": message_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    pub async fn create_chat_session(
        &self,
        meeting_id: &str,
        user_id: &str,
        user_name: &str,
    ) -> Result<String, DbError> {
        let now = Utc::now();
        let session = ChatSession {
            session_id: ids::session_id(meeting_id, user_id),
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            joined_at: now,
            last_activity: now,
            is_active: true,
        };

        self.chat_sessions()
            .insert_one(sanitize::strip_nulls(docs::session_to_document(&session)), None)
            .await?;
        Ok(session.session_id)
    }

    pub async fn touch_chat_session(&self, session_id: &str) -> Result<(), DbError> {
        self.chat_sessions()
            .update_one(
                doc! { "sessionId": session_id },
                doc! { "$set": { "lastActivity": BsonDateTime::from_chrono(Utc::now()) } },
                None,
            )
            .await?;
        Ok(())
    }

    /// Sessions still marked active with activity inside the 5-minute
    /// presence window.
    pub async fn get_active_chat_participants(
        &self,
        meeting_id: &str,
    ) -> Result<Vec<ChatSession>, DbError> {
        let cutoff = BsonDateTime::from_chrono(Utc::now() - ACTIVE_SESSION_WINDOW);
        let cursor = self
            .chat_sessions()
            .find(
                doc! {
                    "meetingId": meeting_id,
                    "isActive": true,
                    "lastActivity": { "$gte": cutoff },
                },
                None,
            )
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.iter().map(docs::session_from_document).collect())
    }

    /// Persists recording metadata; the identifier is generated here.
    pub async fn save_recording(&self, recording: &RecordingEntry) -> Result<String, DbError> {
        let recording_id = ids::recording_id(&recording.meeting_id);
        let mut doc = docs::recording_to_document(recording);
        doc.insert("recordingId", &recording_id);
        doc.insert("createdAt", BsonDateTime::from_chrono(Utc::now()));

        self.recordings()
            .insert_one(sanitize::strip_nulls(doc), None)
            .await?;
        info!("Recording saved: {recording_id}");
        Ok(recording_id)
    }

    pub async fn get_meeting_recordings(
        &self,
        meeting_id: &str,
    ) -> Result<Vec<RecordingEntry>, DbError> {
        self.find_recordings(doc! { "meetingId": meeting_id }).await
    }

    /// Recordings whose `createdBy` participant list contains the user,
    /// newest first.
    pub async fn get_user_recordings(&self, user_id: &str) -> Result<Vec<RecordingEntry>, DbError> {
        self.find_recordings(doc! { "createdBy": { "$in": [user_id] } })
            .await
    }

    async fn find_recordings(&self, query: Document) -> Result<Vec<RecordingEntry>, DbError> {
        let options = FindOptions::builder()
            .sort(doc! { "startedAt": -1 })
            .build();
        let cursor = self.recordings().find(query, options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.iter().map(docs::recording_from_document).collect())
    }

    pub async fn save_invitation_record(&self, record: &InvitationRecord) -> Result<(), DbError> {
        self.invitations()
            .insert_one(
                sanitize::strip_nulls(docs::invitation_to_document(record)),
                None,
            )
            .await?;
        Ok(())
    }

    /// Invitation audit entries for a meeting and host, newest first.
    pub async fn get_invitation_history(
        &self,
        meeting_id: &str,
        host_id: &str,
    ) -> Result<Vec<InvitationRecord>, DbError> {
        let options = FindOptions::builder().sort(doc! { "sentAt": -1 }).build();
        let cursor = self
            .invitations()
            .find(doc! { "meetingId": meeting_id, "hostId": host_id }, options)
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.iter().map(docs::invitation_from_document).collect())
    }

    /// Records that a summary email went out for `(meeting, end_time)`.
    /// Returns false when a record already exists, so the same summary
    /// is never dispatched twice. Relies on the unique summaries index.
    pub async fn record_summary_dispatch(
        &self,
        meeting_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let doc = doc! {
            "meetingId": meeting_id,
            "endTime": BsonDateTime::from_chrono(end_time),
            "sentAt": BsonDateTime::from_chrono(Utc::now()),
        };
        match self.summaries().insert_one(doc, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Pings the server and counts collections. Never fails; an
    /// unreachable database reports as unhealthy.
    pub async fn health_check(&self) -> DatabaseHealth {
        let timestamp = Utc::now();
        let ping = self.db.run_command(doc! { "ping": 1 }, None).await;
        match ping {
            Ok(_) => match self.db.list_collection_names(None).await {
                Ok(names) => DatabaseHealth {
                    status: "healthy".to_string(),
                    collections: Some(names.len()),
                    error: None,
                    timestamp,
                },
                Err(e) => DatabaseHealth {
                    status: "unhealthy".to_string(),
                    collections: None,
                    error: Some(e.to_string()),
                    timestamp,
                },
            },
            Err(e) => DatabaseHealth {
                status: "unhealthy".to_string(),
                collections: None,
                error: Some(e.to_string()),
                timestamp,
            },
        }
    }

    /// Creates the query indexes. Safe to call on every start; index
    /// creation is idempotent for an unchanged spec.
    pub async fn ensure_indexes(&self) -> Result<(), DbError> {
        let messages = self.messages();
        messages
            .create_index(index(doc! { "meetingId": 1, "timestamp": 1 }, None), None)
            .await?;
        messages
            .create_index(index(doc! { "senderId": 1 }, None), None)
            .await?;

        let meetings = self.meetings();
        meetings
            .create_index(
                index_unique(doc! { "meetingId": 1 }, "meeting_id_unique"),
                None,
            )
            .await?;
        meetings
            .create_index(index(doc! { "hostId": 1 }, None), None)
            .await?;
        meetings
            .create_index(index(doc! { "guests": 1 }, None), None)
            .await?;

        self.chat_sessions()
            .create_index(index(doc! { "meetingId": 1, "userId": 1 }, None), None)
            .await?;

        self.summaries()
            .create_index(
                index_unique(doc! { "meetingId": 1, "endTime": 1 }, "meeting_summary_unique"),
                None,
            )
            .await?;

        info!("Database indexes ensured");
        Ok(())
    }

    /// Creates any required collection that does not exist yet and
    /// reports the audit either way.
    pub async fn ensure_collections(&self) -> Result<CollectionAudit, DbError> {
        let existing = self.db.list_collection_names(None).await?;
        let required: Vec<String> = self
            .collections
            .all()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !existing.contains(name))
            .cloned()
            .collect();

        for name in &missing {
            if let Err(e) = self.db.create_collection(name, None).await {
                warn!("Failed to create collection {name}: {e}");
            } else {
                info!("Created collection {name}");
            }
        }

        Ok(CollectionAudit {
            existing_collections: existing,
            required_collections: required,
            missing_collections: missing,
        })
    }
}

fn index(keys: Document, name: Option<&str>) -> IndexModel {
    match name {
        Some(name) => IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().name(name.to_string()).build())
            .build(),
        None => IndexModel::builder().keys(keys).build(),
    }
}

fn index_unique(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build(),
        )
        .build()
}
