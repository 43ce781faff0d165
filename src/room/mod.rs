pub mod messages;
pub mod watch;

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::db::{DbError, MeetingStore};
use crate::reconcile::Reconciler;
use crate::shared::ids;
use crate::shared::models::{Meeting, MeetingStatus, RecordingEntry};
use crate::stream::{
    CallMember, CallSpec, ChatClient, ParticipantProfile, StreamError, VideoClient,
};

use messages::{FlushReport, IncomingMessage, MessageBuffer};

#[derive(Debug, Clone)]
pub enum RoomError {
    Db(DbError),
    Stream(StreamError),
    NotHost,
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(e) => write!(f, "{e}"),
            Self::Stream(e) => write!(f, "{e}"),
            Self::NotHost => write!(f, "Only the host can end the call for everyone"),
        }
    }
}

impl std::error::Error for RoomError {}

impl From<DbError> for RoomError {
    fn from(err: DbError) -> Self {
        RoomError::Db(err)
    }
}

impl From<StreamError> for RoomError {
    fn from(err: StreamError) -> Self {
        RoomError::Stream(err)
    }
}

/// Camera/microphone enablement picked on the setup screen. Recorded
/// on the call so a rejoin restores the same state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePreferences {
    pub initial_camera_enabled: bool,
    pub initial_mic_enabled: bool,
}

impl Default for DevicePreferences {
    fn default() -> Self {
        Self {
            initial_camera_enabled: true,
            initial_mic_enabled: true,
        }
    }
}

/// End of a meeting when the organizer picked none.
pub fn default_end_time(start: DateTime<Utc>) -> DateTime<Utc> {
    start + ChronoDuration::hours(1)
}

fn default_spec(user: &ParticipantProfile) -> CallSpec {
    CallSpec {
        created_by: user.user_id.clone(),
        starts_at: Utc::now(),
        members: vec![CallMember::host(&user.user_id)],
        custom: json!({
            "description": "Instant Meeting",
            "host": user.display_name(),
        }),
    }
}

/// Call descriptor for a start-now meeting: generated id, immediate
/// start, the creator as host.
pub fn instant_call(host: &ParticipantProfile) -> (String, CallSpec) {
    (ids::instant_meeting_id(), default_spec(host))
}

/// Call descriptor for a scheduled meeting. Guests, timezone and the
/// notification lead time ride along in custom metadata so clients can
/// read them back without a database round trip.
pub fn scheduled_call(meeting: &Meeting) -> CallSpec {
    let description = if meeting.description.is_empty() {
        "Scheduled Meeting".to_string()
    } else {
        meeting.description.clone()
    };
    CallSpec {
        created_by: meeting.host_id.clone(),
        starts_at: meeting.start_time,
        members: vec![CallMember::host(&meeting.host_id)],
        custom: json!({
            "description": description,
            "host": meeting.host_name,
            "guests": meeting.guests,
            "timezone": meeting.timezone,
            "notificationTime": meeting.notification_time,
        }),
    }
}

/// One participant's presence in a running meeting, constructed on
/// join and dropped on leave. Buffers this participant's view of the
/// chat, keeps the presence session warm, and owns the membership sync
/// runner for the meeting channel.
pub struct RoomSession {
    meeting_id: String,
    user: ParticipantProfile,
    devices: DevicePreferences,
    is_host: bool,
    session_id: String,
    buffer: RwLock<MessageBuffer>,
    reconciler: Arc<Reconciler>,
    sync_task: tokio::task::JoinHandle<()>,
    store: Arc<MeetingStore>,
    video: Arc<VideoClient>,
}

impl RoomSession {
    /// Joins the meeting: resolves the call (creating it when this is
    /// the first arrival), records the participant name and device
    /// preferences on it, ensures chat access, opens a presence
    /// session and starts the membership sync runner.
    pub async fn join(
        store: Arc<MeetingStore>,
        video: Arc<VideoClient>,
        chat: Arc<ChatClient>,
        meeting_id: impl Into<String>,
        user: ParticipantProfile,
        devices: DevicePreferences,
    ) -> Result<Self, RoomError> {
        let meeting_id = meeting_id.into();

        let call = video
            .get_or_create_call(&meeting_id, &default_spec(&user))
            .await?;
        let is_host = call.created_by_id == user.user_id;

        video
            .set_custom(
                &meeting_id,
                json!({
                    "participantName": user.display_name(),
                    "initialCameraEnabled": devices.initial_camera_enabled,
                    "initialMicEnabled": devices.initial_mic_enabled,
                }),
            )
            .await?;

        // Chat is best-effort at join time; the sync runner keeps
        // retrying membership afterwards.
        match chat.join_channel(&meeting_id, &user.user_id).await {
            Ok(outcome) => info!("{} (user {})", outcome.message(), user.user_id),
            Err(e) => warn!(
                "Chat access for {} in meeting {} failed: {}",
                user.user_id, meeting_id, e
            ),
        }

        let session_id = store
            .create_chat_session(&meeting_id, &user.user_id, user.display_name())
            .await?;

        if is_host {
            if let Err(e) = store
                .update_meeting_status(&meeting_id, MeetingStatus::Ongoing)
                .await
            {
                warn!("Could not mark meeting {meeting_id} ongoing: {e}");
            }
        }

        let reconciler = Arc::new(Reconciler::new(chat, meeting_id.clone()));
        reconciler.update_roster(vec![user.clone()]).await;
        let sync_task = reconciler.clone().spawn();

        info!("{} joined meeting {}", user.user_id, meeting_id);
        Ok(Self {
            buffer: RwLock::new(MessageBuffer::new(meeting_id.clone())),
            meeting_id,
            user,
            devices,
            is_host,
            session_id,
            reconciler,
            sync_task,
            store,
            video,
        })
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn devices(&self) -> DevicePreferences {
        self.devices
    }

    /// New roster from a participant joined/left event. Feeds the sync
    /// runner and keeps the presence session warm.
    pub async fn participants_changed(&self, roster: Vec<ParticipantProfile>) {
        self.reconciler.update_roster(roster).await;
        self.touch_presence().await;
    }

    /// Buffers a live chat message for the end-of-call flush.
    pub async fn record_message(&self, incoming: IncomingMessage) {
        self.buffer.write().await.record(incoming);
        self.touch_presence().await;
    }

    async fn touch_presence(&self) {
        if let Err(e) = self.store.touch_chat_session(&self.session_id).await {
            warn!("Presence touch failed for {}: {}", self.session_id, e);
        }
    }

    /// Writes every buffered message through the persistence facade,
    /// all in flight at once. Per-message failures lower the saved
    /// count and nothing is retried.
    pub async fn flush_chat(&self) -> FlushReport {
        let pending = self.buffer.write().await.drain();
        if pending.is_empty() {
            return FlushReport::default();
        }

        let total_count = pending.len();
        let saves = pending
            .iter()
            .map(|message| self.store.save_chat_message(message));
        let results = join_all(saves).await;

        let saved_count = results.iter().filter(|result| result.is_ok()).count();
        let failed_count = total_count - saved_count;
        info!(
            "Saved {saved_count} chat message(s) for meeting {}",
            self.meeting_id
        );
        if failed_count > 0 {
            warn!(
                "Failed to save {failed_count} of {total_count} chat message(s) for meeting {}",
                self.meeting_id
            );
        }
        FlushReport {
            saved_count,
            failed_count,
            total_count,
        }
    }

    pub async fn start_recording(&self) -> Result<(), RoomError> {
        self.video.start_recording(&self.meeting_id).await?;
        Ok(())
    }

    /// Stops the recording, waits for the vendor to finish processing,
    /// and persists the artifact credited to everyone on the roster.
    /// Returns None when no artifact shows up inside the poll budget;
    /// nothing is written in that case.
    pub async fn finish_recording(&self) -> Result<Option<RecordingEntry>, RoomError> {
        self.video.stop_recording(&self.meeting_id).await?;

        let artifact = match self.video.await_recording(&self.meeting_id).await {
            Some(artifact) => artifact,
            None => return Ok(None),
        };

        let mut created_by: Vec<String> = self
            .reconciler
            .roster()
            .await
            .into_iter()
            .map(|participant| participant.user_id)
            .collect();
        if created_by.is_empty() {
            created_by.push(self.user.user_id.clone());
        }

        let mut entry = RecordingEntry {
            recording_id: String::new(),
            meeting_id: self.meeting_id.clone(),
            call_id: self.meeting_id.clone(),
            recording_url: artifact.url,
            started_at: artifact.start_time,
            ended_at: artifact.end_time,
            created_by,
            created_at: Utc::now(),
        };
        entry.recording_id = self.store.save_recording(&entry).await?;
        info!(
            "Recording saved for meeting {}: {}",
            self.meeting_id, entry.recording_url
        );
        Ok(Some(entry))
    }

    /// Ends the call for every participant. Host only. The chat buffer
    /// is flushed first; a failed flush is logged and does not keep
    /// the call alive.
    pub async fn end_for_everyone(&self) -> Result<FlushReport, RoomError> {
        if !self.is_host {
            return Err(RoomError::NotHost);
        }

        let report = self.flush_chat().await;
        self.video.end_call(&self.meeting_id).await?;
        if let Err(e) = self
            .store
            .update_meeting_status(&self.meeting_id, MeetingStatus::Completed)
            .await
        {
            warn!("Could not mark meeting {} completed: {}", self.meeting_id, e);
        }
        info!(
            "Meeting {} ended by host {}",
            self.meeting_id, self.user.user_id
        );
        Ok(report)
    }

    /// Leaves the room, flushing this participant's buffered messages.
    /// The call itself keeps going.
    pub async fn leave(self) -> FlushReport {
        let report = self.flush_chat().await;
        info!("{} left meeting {}", self.user.user_id, self.meeting_id);
        report
    }
}

impl Drop for RoomSession {
    // Stops the sync runner when the session goes away.
    fn drop(&mut self) {
        self.sync_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> ParticipantProfile {
        ParticipantProfile {
            user_id: "host-1".to_string(),
            name: Some("Grace".to_string()),
            image: None,
        }
    }

    fn meeting(description: &str) -> Meeting {
        let now = Utc::now();
        Meeting {
            meeting_id: "m1".to_string(),
            host_id: "host-1".to_string(),
            host_name: "Grace".to_string(),
            title: "Planning".to_string(),
            description: description.to_string(),
            start_time: now + ChronoDuration::hours(3),
            end_time: now + ChronoDuration::hours(4),
            guests: vec!["a@x.com".to_string()],
            timezone: "UTC".to_string(),
            notification_time: 15,
            status: MeetingStatus::Scheduled,
            meeting_url: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_instant_call_defaults() {
        let (call_id, spec) = instant_call(&host());

        assert_eq!(call_id.len(), 36);
        assert_eq!(spec.created_by, "host-1");
        assert_eq!(spec.members.len(), 1);
        assert_eq!(spec.members[0].role, "host");
        assert_eq!(spec.custom["description"], "Instant Meeting");
        assert_eq!(spec.custom["host"], "Grace");
    }

    #[test]
    fn test_scheduled_call_carries_metadata() {
        let spec = scheduled_call(&meeting(""));

        assert_eq!(spec.created_by, "host-1");
        assert_eq!(spec.custom["description"], "Scheduled Meeting");
        assert_eq!(spec.custom["guests"][0], "a@x.com");
        assert_eq!(spec.custom["timezone"], "UTC");
        assert_eq!(spec.custom["notificationTime"], 15);
    }

    #[test]
    fn test_scheduled_call_keeps_given_description() {
        let spec = scheduled_call(&meeting("Quarterly review"));
        assert_eq!(spec.custom["description"], "Quarterly review");
    }

    #[test]
    fn test_default_end_time_is_one_hour() {
        let start = Utc::now();
        assert_eq!(default_end_time(start) - start, ChronoDuration::hours(1));
    }

    #[test]
    fn test_device_preferences_default_on() {
        let devices = DevicePreferences::default();
        assert!(devices.initial_camera_enabled);
        assert!(devices.initial_mic_enabled);
    }

    #[test]
    fn test_room_error_display() {
        assert_eq!(
            RoomError::NotHost.to_string(),
            "Only the host can end the call for everyone"
        );
        let wrapped = RoomError::Stream(StreamError::NotConfigured);
        assert_eq!(wrapped.to_string(), "Stream API configuration is missing");
    }
}
