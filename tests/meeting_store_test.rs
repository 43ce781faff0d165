#[cfg(test)]
mod meeting_store_integration_tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;
    use wismeet::config::{CollectionNames, DatabaseConfig};
    use wismeet::db::{DbError, MeetingFilter, MeetingStore};
    use wismeet::shared::models::{
        ChatMessage, EmailOutcome, InvitationRecord, Meeting, MeetingStatus, MessageType,
        RecordingEntry,
    };

    /// Connects to the test database, or None when no MongoDB is
    /// reachable (the suite then skips).
    async fn connect_store() -> Option<MeetingStore> {
        let uri = match std::env::var("MONGODB_URI") {
            Ok(uri) => uri,
            Err(_) => {
                println!("Skipping test - MONGODB_URI not set");
                return None;
            }
        };
        let config = DatabaseConfig {
            uri,
            database: "wismeet_test".to_string(),
            collections: CollectionNames::default(),
            max_pool_size: 4,
            min_pool_size: 1,
        };
        match MeetingStore::connect(&config).await {
            Ok(store) => {
                store.ensure_indexes().await.ok();
                Some(store)
            }
            Err(e) => {
                println!("Skipping test - Cannot connect to MongoDB: {e}");
                None
            }
        }
    }

    fn unique_id(prefix: &str) -> String {
        format!("{prefix}_{}", Uuid::new_v4())
    }

    fn meeting(meeting_id: &str, host_id: &str, start_offset_hours: i64) -> Meeting {
        let now = Utc::now();
        let start = now + Duration::hours(start_offset_hours);
        Meeting {
            meeting_id: meeting_id.to_string(),
            host_id: host_id.to_string(),
            host_name: "Test Host".to_string(),
            title: "Integration sync".to_string(),
            description: String::new(),
            start_time: start,
            end_time: start + Duration::hours(1),
            guests: vec!["guest@example.com".to_string()],
            timezone: "UTC".to_string(),
            notification_time: 15,
            status: MeetingStatus::Scheduled,
            meeting_url: format!("http://localhost:3000/meeting/{meeting_id}"),
            created_at: now,
            updated_at: now,
        }
    }

    fn message(meeting_id: &str, sender_id: &str, text: &str, offset_secs: i64) -> ChatMessage {
        ChatMessage {
            message_id: String::new(),
            meeting_id: meeting_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_id.to_string(),
            message: text.to_string(),
            message_type: MessageType::Text,
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            is_private: false,
            recipient_id: None,
            file_url: None,
            file_name: None,
        }
    }

    #[tokio::test]
    async fn test_meeting_lifecycle() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let host_id = unique_id("host");
        let upcoming_id = unique_id("meeting");
        let past_id = unique_id("meeting");

        store
            .save_meeting(&meeting(&upcoming_id, &host_id, 48))
            .await
            .unwrap();
        store
            .save_meeting(&meeting(&past_id, &host_id, -48))
            .await
            .unwrap();

        let fetched = store.get_meeting(&upcoming_id).await.unwrap().unwrap();
        assert_eq!(fetched.host_id, host_id);
        assert_eq!(fetched.status, MeetingStatus::Scheduled);

        let upcoming = store
            .get_user_meetings(&host_id, None, MeetingFilter::Upcoming, 10)
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].meeting_id, upcoming_id);

        let past = store
            .get_user_meetings(&host_id, None, MeetingFilter::Past, 10)
            .await
            .unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].meeting_id, past_id);

        let all = store
            .get_user_meetings(&host_id, None, MeetingFilter::All, 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let modified = store
            .update_meeting_status(&upcoming_id, MeetingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(modified, 1);
        let cancelled = store.get_meeting(&upcoming_id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, MeetingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_guest_sees_meeting_by_email() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let host_id = unique_id("host");
        let meeting_id = unique_id("meeting");
        let guest_email = format!("{}@example.com", unique_id("guest"));

        let mut scheduled = meeting(&meeting_id, &host_id, 24);
        scheduled.guests = vec![guest_email.clone()];
        store.save_meeting(&scheduled).await.unwrap();

        let visible = store
            .get_user_meetings("someone-else", Some(&guest_email), MeetingFilter::All, 10)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].meeting_id, meeting_id);

        let hidden = store
            .get_user_meetings("someone-else", None, MeetingFilter::All, 10)
            .await
            .unwrap();
        assert!(hidden.is_empty());
    }

    #[tokio::test]
    async fn test_chat_history_excludes_private_messages() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");

        store
            .save_chat_message(&message(&meeting_id, "alice", "first", 0))
            .await
            .unwrap();
        store
            .save_chat_message(&message(&meeting_id, "bob", "second", 1))
            .await
            .unwrap();
        let mut private = message(&meeting_id, "alice", "psst", 2);
        private.is_private = true;
        private.recipient_id = Some("bob".to_string());
        store.save_chat_message(&private).await.unwrap();

        let public = store.get_chat_messages(&meeting_id, 100).await.unwrap();
        assert_eq!(public.len(), 2);
        assert_eq!(public[0].message, "first");
        assert_eq!(public[1].message, "second");

        let thread = store
            .get_private_messages(&meeting_id, "bob", "alice")
            .await
            .unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].message, "psst");

        // No messages at all is a normal empty result, not an error.
        let none = store
            .get_chat_messages(&unique_id("meeting"), 100)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_chat_history_returns_newest_window_in_order() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");
        for i in 0..5 {
            store
                .save_chat_message(&message(&meeting_id, "alice", &format!("msg-{i}"), i))
                .await
                .unwrap();
        }

        let window = store.get_chat_messages(&meeting_id, 3).await.unwrap();
        let texts: Vec<&str> = window.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["msg-2", "msg-3", "msg-4"]);
    }

    #[tokio::test]
    async fn test_delete_message_permissions() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");
        let message_id = store
            .save_chat_message(&message(&meeting_id, "alice", "mine", 0))
            .await
            .unwrap();

        let stranger = store
            .delete_chat_message(&message_id, "mallory", false)
            .await;
        assert!(matches!(stranger, Err(DbError::Unauthorized(_))));

        let deleted = store
            .delete_chat_message(&message_id, "alice", false)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let missing = store.delete_chat_message(&message_id, "alice", false).await;
        assert!(matches!(missing, Err(DbError::NotFound(_))));

        // The host may delete anyone's message.
        let other_id = store
            .save_chat_message(&message(&meeting_id, "bob", "bobs", 0))
            .await
            .unwrap();
        let by_host = store
            .delete_chat_message(&other_id, "host", true)
            .await
            .unwrap();
        assert_eq!(by_host, 1);
    }

    #[tokio::test]
    async fn test_chat_sessions_report_active_participants() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");
        let user_id = unique_id("user");

        let session_id = store
            .create_chat_session(&meeting_id, &user_id, "Test User")
            .await
            .unwrap();
        store.touch_chat_session(&session_id).await.unwrap();

        let active = store
            .get_active_chat_participants(&meeting_id)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, user_id);
        assert!(active[0].is_active);
    }

    #[tokio::test]
    async fn test_recordings_found_by_participant() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");
        let participant = unique_id("user");
        let now = Utc::now();

        let entry = RecordingEntry {
            recording_id: String::new(),
            meeting_id: meeting_id.clone(),
            call_id: meeting_id.clone(),
            recording_url: "https://cdn.example.com/rec.mp4".to_string(),
            started_at: Some(now - Duration::minutes(30)),
            ended_at: Some(now),
            created_by: vec![participant.clone(), "other".to_string()],
            created_at: now,
        };
        let recording_id = store.save_recording(&entry).await.unwrap();
        assert!(recording_id.starts_with(&meeting_id));

        let by_user = store.get_user_recordings(&participant).await.unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].recording_url, entry.recording_url);

        let by_meeting = store.get_meeting_recordings(&meeting_id).await.unwrap();
        assert_eq!(by_meeting.len(), 1);

        let nobody = store
            .get_user_recordings(&unique_id("user"))
            .await
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn test_invitation_history_newest_first() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");
        let host_id = unique_id("host");
        let now = Utc::now();

        for round in 0..2 {
            let record = InvitationRecord {
                meeting_id: meeting_id.clone(),
                host_id: host_id.clone(),
                host_name: "Test Host".to_string(),
                title: "Integration sync".to_string(),
                start_time: now + Duration::hours(2),
                end_time: now + Duration::hours(3),
                description: String::new(),
                guest_emails: vec!["a@example.com".to_string()],
                email_results: vec![EmailOutcome::sent(
                    "a@example.com",
                    format!("<round-{round}@wismeet>"),
                )],
                sent_at: now + Duration::seconds(round),
                status: "sent".to_string(),
            };
            store.save_invitation_record(&record).await.unwrap();
        }

        let history = store
            .get_invitation_history(&meeting_id, &host_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].sent_at > history[1].sent_at);
        assert_eq!(history[0].email_results.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_dispatch_is_recorded_once() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };
        let meeting_id = unique_id("meeting");
        let end_time = Utc::now();

        let first = store
            .record_summary_dispatch(&meeting_id, end_time)
            .await
            .unwrap();
        let second = store
            .record_summary_dispatch(&meeting_id, end_time)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_health_check_reports_healthy() {
        let store = match connect_store().await {
            Some(store) => store,
            None => return,
        };

        let health = store.health_check().await;
        assert!(health.is_healthy());
        assert!(health.collections.is_some());
        assert!(health.error.is_none());

        let audit = store.ensure_collections().await.unwrap();
        assert_eq!(audit.required_collections.len(), 6);
    }
}
