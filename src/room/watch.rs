use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};

use crate::db::{MeetingFilter, MeetingStore};
use crate::shared::models::{MeetingView, RecordingEntry};
use crate::stream::{CallSummary, VideoClient};

/// Cadence of the background call-list refresh.
pub const CALL_LIST_REFRESH: Duration = Duration::from_secs(30);
/// How many meetings one overview fetch pulls.
pub const MEETING_FETCH_LIMIT: i64 = 50;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One fetch cycle's observable state. `data` keeps the previous value
/// across a failed refresh, so readers see stale data plus the error
/// rather than a blank screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchState<T> {
    pub data: T,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl<T: Default> FetchState<T> {
    pub fn loading() -> Self {
        Self {
            data: T::default(),
            is_loading: true,
            error: None,
            last_refreshed: None,
        }
    }
}

impl<T> FetchState<T> {
    pub fn resolve(&mut self, data: T) {
        self.data = data;
        self.is_loading = false;
        self.error = None;
        self.last_refreshed = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.is_loading = false;
        self.error = Some(error.into());
    }
}

/// The three lists the home screen shows for a user.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLists {
    pub upcoming_calls: Vec<CallSummary>,
    pub ended_calls: Vec<CallSummary>,
    pub recordings: Vec<RecordingEntry>,
}

/// A user's stored meetings split by whether they are still ahead.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingOverview {
    pub meetings: Vec<MeetingView>,
    pub upcoming_meetings: Vec<MeetingView>,
    pub past_meetings: Vec<MeetingView>,
}

pub fn partition_meetings(meetings: Vec<MeetingView>) -> MeetingOverview {
    let upcoming_meetings = meetings
        .iter()
        .filter(|meeting| meeting.is_upcoming)
        .cloned()
        .collect();
    let past_meetings = meetings
        .iter()
        .filter(|meeting| meeting.is_past)
        .cloned()
        .collect();
    MeetingOverview {
        meetings,
        upcoming_meetings,
        past_meetings,
    }
}

/// Keeps a user's upcoming calls, ended calls and recordings fresh,
/// refetching on a fixed timer and on demand.
pub struct CallListWatcher {
    video: Arc<VideoClient>,
    store: Arc<MeetingStore>,
    user_id: String,
    state: RwLock<FetchState<CallLists>>,
}

impl CallListWatcher {
    pub fn new(video: Arc<VideoClient>, store: Arc<MeetingStore>, user_id: impl Into<String>) -> Self {
        Self {
            video,
            store,
            user_id: user_id.into(),
            state: RwLock::new(FetchState::loading()),
        }
    }

    pub async fn snapshot(&self) -> FetchState<CallLists> {
        self.state.read().await.clone()
    }

    pub async fn refetch(&self) {
        self.state.write().await.is_loading = true;
        match self.fetch().await {
            Ok(lists) => self.state.write().await.resolve(lists),
            Err(e) => {
                error!("Call list refresh failed for {}: {}", self.user_id, e);
                self.state.write().await.fail(e.to_string());
            }
        }
    }

    async fn fetch(&self) -> Result<CallLists, BoxError> {
        let upcoming_calls = self.video.query_upcoming(&self.user_id).await?;
        let ended_calls = self.video.query_ended(&self.user_id).await?;
        let recordings = self.store.get_user_recordings(&self.user_id).await?;
        Ok(CallLists {
            upcoming_calls,
            ended_calls,
            recordings,
        })
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(CALL_LIST_REFRESH);
            loop {
                tick.tick().await;
                self.refetch().await;
            }
        })
    }
}

/// On-demand view of a user's stored meetings with the computed
/// host/upcoming/past annotations. No timer; callers refetch when
/// their inputs change.
pub struct MeetingWatcher {
    store: Arc<MeetingStore>,
    user_id: String,
    email: Option<String>,
    state: RwLock<FetchState<MeetingOverview>>,
}

impl MeetingWatcher {
    pub fn new(store: Arc<MeetingStore>, user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            email,
            state: RwLock::new(FetchState::loading()),
        }
    }

    pub async fn snapshot(&self) -> FetchState<MeetingOverview> {
        self.state.read().await.clone()
    }

    pub async fn refetch(&self) {
        self.state.write().await.is_loading = true;
        let fetched = self
            .store
            .get_user_meetings(
                &self.user_id,
                self.email.as_deref(),
                MeetingFilter::All,
                MEETING_FETCH_LIMIT,
            )
            .await;

        match fetched {
            Ok(meetings) => {
                let now = Utc::now();
                let views = meetings
                    .into_iter()
                    .map(|meeting| MeetingView::annotate(meeting, &self.user_id, now))
                    .collect();
                self.state.write().await.resolve(partition_meetings(views));
            }
            Err(e) => {
                error!("Meeting overview refresh failed for {}: {}", self.user_id, e);
                self.state.write().await.fail(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Meeting, MeetingStatus};
    use chrono::Duration as ChronoDuration;

    fn view(meeting_id: &str, start_offset_hours: i64) -> MeetingView {
        let now = Utc::now();
        let meeting = Meeting {
            meeting_id: meeting_id.to_string(),
            host_id: "host".to_string(),
            host_name: "Host".to_string(),
            title: "Standup".to_string(),
            description: String::new(),
            start_time: now + ChronoDuration::hours(start_offset_hours),
            end_time: now + ChronoDuration::hours(start_offset_hours + 1),
            guests: Vec::new(),
            timezone: "UTC".to_string(),
            notification_time: 15,
            status: MeetingStatus::Scheduled,
            meeting_url: String::new(),
            created_at: now,
            updated_at: now,
        };
        MeetingView::annotate(meeting, "host", now)
    }

    #[test]
    fn test_fetch_state_resolve_clears_error() {
        let mut state: FetchState<Vec<u32>> = FetchState::loading();
        assert!(state.is_loading);

        state.fail("boom");
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(!state.is_loading);

        state.resolve(vec![1, 2]);
        assert_eq!(state.data, vec![1, 2]);
        assert!(state.error.is_none());
        assert!(state.last_refreshed.is_some());
    }

    #[test]
    fn test_fetch_state_failure_keeps_stale_data() {
        let mut state: FetchState<Vec<u32>> = FetchState::loading();
        state.resolve(vec![7]);

        state.fail("upstream down");
        assert_eq!(state.data, vec![7]);
        assert_eq!(state.error.as_deref(), Some("upstream down"));
    }

    #[test]
    fn test_partition_meetings_splits_by_start() {
        let views = vec![view("future", 2), view("past", -2), view("soon", 1)];

        let overview = partition_meetings(views);
        assert_eq!(overview.meetings.len(), 3);
        assert_eq!(overview.upcoming_meetings.len(), 2);
        assert_eq!(overview.past_meetings.len(), 1);
        assert_eq!(overview.past_meetings[0].meeting.meeting_id, "past");
    }
}
