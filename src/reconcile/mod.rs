use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, sleep, Duration};

use crate::stream::{ChannelKind, ChatClient, ParticipantProfile, ProvisionError, StreamError};

/// Delay between a participant joined/left event and the sync it
/// triggers, so a burst of events collapses into one pass.
pub const EVENT_DEBOUNCE: Duration = Duration::from_secs(1);
/// Delay before the first pass after the runner starts.
pub const INITIAL_DELAY: Duration = Duration::from_secs(2);
/// Cadence of the periodic pass that catches missed events.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(10);

// The video side hands out purely numeric ids for anonymous viewers.
// Those are placeholders, not chat users.
static PLACEHOLDER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// True for participants that should exist on the chat side.
pub fn eligible(participant: &ParticipantProfile) -> bool {
    !participant.user_id.is_empty() && !PLACEHOLDER_ID.is_match(&participant.user_id)
}

/// Participants that are missing from the channel membership, with
/// placeholders and duplicates dropped. Pure; the runner feeds it the
/// live roster and the queried member list.
pub fn plan_sync(
    participants: &[ParticipantProfile],
    members: &HashSet<String>,
) -> Vec<ParticipantProfile> {
    let mut seen = HashSet::new();
    participants
        .iter()
        .filter(|p| eligible(p))
        .filter(|p| !members.contains(&p.user_id))
        .filter(|p| seen.insert(p.user_id.clone()))
        .cloned()
        .collect()
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub added: Vec<String>,
    pub errors: Vec<ProvisionError>,
}

impl SyncReport {
    /// Nothing was missing and nothing failed.
    pub fn in_sync(&self) -> bool {
        self.added.is_empty() && self.errors.is_empty()
    }
}

/// Keeps a meeting channel's membership aligned with the live video
/// roster. The room session pushes roster updates in; a spawned runner
/// reacts to them (debounced) and also re-checks on a timer.
pub struct Reconciler {
    chat: Arc<ChatClient>,
    meeting_id: String,
    channel_kind: ChannelKind,
    roster: RwLock<Vec<ParticipantProfile>>,
    events: Notify,
}

impl Reconciler {
    pub fn new(chat: Arc<ChatClient>, meeting_id: impl Into<String>) -> Self {
        Self {
            chat,
            meeting_id: meeting_id.into(),
            channel_kind: ChannelKind::Messaging,
            roster: RwLock::new(Vec::new()),
            events: Notify::new(),
        }
    }

    /// Replaces the known roster and schedules a debounced pass.
    pub async fn update_roster(&self, participants: Vec<ParticipantProfile>) {
        *self.roster.write().await = participants;
        self.events.notify_one();
    }

    /// The roster as of the last update.
    pub async fn roster(&self) -> Vec<ParticipantProfile> {
        self.roster.read().await.clone()
    }

    /// One reconciliation pass: query current members, provision the
    /// missing participants, add them to the channel. A pass with no
    /// drift touches nothing on the chat side.
    pub async fn sync_once(&self) -> Result<SyncReport, StreamError> {
        let participants = self.roster.read().await.clone();
        let members: HashSet<String> = self
            .chat
            .channel_members(self.channel_kind, &self.meeting_id)
            .await?
            .into_iter()
            .collect();

        let missing = plan_sync(&participants, &members);
        if missing.is_empty() {
            debug!("Chat members already in sync for meeting {}", self.meeting_id);
            return Ok(SyncReport::default());
        }

        info!(
            "Adding {} missing participant(s) to chat channel {}",
            missing.len(),
            self.meeting_id
        );
        let provisioned = self.chat.ensure_users(&missing).await;
        let added: Vec<String> = provisioned
            .created_users
            .iter()
            .map(|user| user.id.clone())
            .collect();
        if !added.is_empty() {
            self.chat
                .add_members(self.channel_kind, &self.meeting_id, &added)
                .await?;
        }
        Ok(SyncReport {
            added,
            errors: provisioned.errors,
        })
    }

    /// Runs reconciliation until the task is aborted: an initial pass
    /// shortly after start, then on every roster event (debounced) and
    /// on the periodic timer.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("Participant sync started for meeting {}", self.meeting_id);
            sleep(INITIAL_DELAY).await;
            let mut tick = interval(SYNC_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = self.events.notified() => {
                        sleep(EVENT_DEBOUNCE).await;
                    }
                }
                if let Err(e) = self.sync_once().await {
                    error!("Participant sync failed for meeting {}: {}", self.meeting_id, e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use mockito::Matcher;
    use serde_json::json;

    fn profile(user_id: &str) -> ParticipantProfile {
        ParticipantProfile {
            user_id: user_id.to_string(),
            name: None,
            image: None,
        }
    }

    fn test_chat(base_url: String) -> Arc<ChatClient> {
        Arc::new(ChatClient::new(&StreamConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            video_base_url: String::new(),
            chat_base_url: base_url,
        }))
    }

    #[test]
    fn test_plan_sync_excludes_placeholders_and_existing_members() {
        let participants = vec![
            profile("host"),
            profile("guest"),
            profile("1755002341"),
            profile(""),
            profile("guest"),
        ];
        let members: HashSet<String> = ["host".to_string()].into_iter().collect();

        let plan = plan_sync(&participants, &members);
        let ids: Vec<&str> = plan.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["guest"]);
    }

    #[test]
    fn test_plan_sync_is_idempotent() {
        let participants = vec![profile("a"), profile("b")];
        let mut members = HashSet::new();

        let first = plan_sync(&participants, &members);
        assert_eq!(first.len(), 2);

        for planned in &first {
            members.insert(planned.user_id.clone());
        }
        assert!(plan_sync(&participants, &members).is_empty());
    }

    #[tokio::test]
    async fn test_sync_once_without_drift_touches_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/channels/messaging/m1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"members": [{"user_id": "host"}, {"user_id": "guest"}]}"#)
            .create_async()
            .await;
        let lookups = server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let additions = server
            .mock("POST", "/channels/messaging/m1")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let reconciler = Reconciler::new(test_chat(server.url()), "m1");
        reconciler
            .update_roster(vec![profile("host"), profile("guest"), profile("42")])
            .await;

        let report = reconciler.sync_once().await.unwrap();
        assert!(report.in_sync());
        lookups.assert_async().await;
        additions.assert_async().await;
    }

    #[tokio::test]
    async fn test_sync_once_adds_missing_participant() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/channels/messaging/m1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"members": [{"user_id": "host"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"users": []}"#)
            .create_async()
            .await;
        let upsert = server
            .mock("POST", "/users")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "users": { "guest": { "id": "guest", "name": "Grace" } }
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        let added = server
            .mock("POST", "/channels/messaging/m1")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({ "add_members": ["guest"] })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let reconciler = Reconciler::new(test_chat(server.url()), "m1");
        reconciler
            .update_roster(vec![
                profile("host"),
                ParticipantProfile {
                    user_id: "guest".to_string(),
                    name: Some("Grace".to_string()),
                    image: None,
                },
            ])
            .await;

        let report = reconciler.sync_once().await.unwrap();
        assert_eq!(report.added, vec!["guest".to_string()]);
        assert!(report.errors.is_empty());
        upsert.assert_async().await;
        added.assert_async().await;
    }
}
