use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{token, StreamError};
use crate::config::StreamConfig;
use crate::shared::retry::RetryPolicy;

/// Every meeting room is a call of this type.
pub const CALL_TYPE: &str = "default";

const QUERY_LIMIT: i64 = 10;
const RECORDING_POLL: RetryPolicy = RetryPolicy::new(5, Duration::from_secs(5));

/// What to create a call with: schedule, roster and the free-form
/// metadata the clients read back out of `custom`.
#[derive(Debug, Clone)]
pub struct CallSpec {
    pub created_by: String,
    pub starts_at: DateTime<Utc>,
    pub members: Vec<CallMember>,
    pub custom: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallMember {
    pub user_id: String,
    pub role: String,
}

impl CallMember {
    pub fn host(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: "host".to_string(),
        }
    }
}

/// The slice of a call's state the server cares about.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub id: String,
    pub created_by_id: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub description: String,
}

/// One processed recording as reported by the vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingArtifact {
    #[serde(default)]
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// REST adapter for the video side of the SDK.
pub struct VideoClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
    recording_poll: RetryPolicy,
}

impl VideoClient {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.video_base_url.trim_end_matches('/').to_string(),
            recording_poll: RECORDING_POLL,
        }
    }

    /// Overrides the recording poll cadence. Tests shrink it to zero.
    pub fn with_poll_policy(mut self, policy: RetryPolicy) -> Self {
        self.recording_poll = policy;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, StreamError> {
        if !self.is_configured() {
            return Err(StreamError::NotConfigured);
        }
        let auth = token::server_token(&self.api_secret)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method, &url)
            .query(&[("api_key", self.api_key.as_str())])
            .header("Authorization", &auth)
            .header("stream-auth-type", "jwt");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StreamError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    fn call_path(&self, call_id: &str) -> String {
        format!("/api/v2/video/call/{CALL_TYPE}/{call_id}")
    }

    /// Creates the call if it does not exist yet; either way returns
    /// its current state.
    pub async fn get_or_create_call(
        &self,
        call_id: &str,
        spec: &CallSpec,
    ) -> Result<CallSummary, StreamError> {
        let body = json!({
            "data": {
                "created_by_id": spec.created_by,
                "starts_at": spec.starts_at.to_rfc3339(),
                "members": spec.members,
                "custom": spec.custom,
            },
        });
        let response = self
            .request(Method::POST, &self.call_path(call_id), Some(body))
            .await?;
        Ok(call_summary(&response))
    }

    /// Writes call-level custom metadata, merged server-side with what
    /// is already there. Used for join-time device preferences.
    pub async fn set_custom(&self, call_id: &str, custom: Value) -> Result<(), StreamError> {
        self.request(
            Method::PATCH,
            &self.call_path(call_id),
            Some(json!({ "custom": custom })),
        )
        .await?;
        Ok(())
    }

    /// Calls the user created or was invited to that start in the
    /// future, soonest first.
    pub async fn query_upcoming(&self, user_id: &str) -> Result<Vec<CallSummary>, StreamError> {
        let body = json!({
            "filter_conditions": {
                "starts_at": { "$gt": Utc::now().to_rfc3339() },
                "$or": [
                    { "created_by_user_id": user_id },
                    { "members": { "$in": [user_id] } },
                ],
            },
            "sort": [{ "field": "starts_at", "direction": 1 }],
            "limit": QUERY_LIMIT,
        });
        self.query_calls(body).await
    }

    /// Calls the user created or was invited to that already ended,
    /// newest first.
    pub async fn query_ended(&self, user_id: &str) -> Result<Vec<CallSummary>, StreamError> {
        let body = json!({
            "filter_conditions": {
                "ended_at": { "$exists": true },
                "$or": [
                    { "created_by_user_id": user_id },
                    { "members": { "$in": [user_id] } },
                ],
            },
            "sort": [{ "field": "ended_at", "direction": -1 }],
            "limit": QUERY_LIMIT,
        });
        self.query_calls(body).await
    }

    async fn query_calls(&self, body: Value) -> Result<Vec<CallSummary>, StreamError> {
        let response = self
            .request(Method::POST, "/api/v2/video/calls", Some(body))
            .await?;
        let calls = response
            .get("calls")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(call_summary).collect())
            .unwrap_or_default();
        Ok(calls)
    }

    pub async fn start_recording(&self, call_id: &str) -> Result<(), StreamError> {
        let path = format!("{}/start_recording", self.call_path(call_id));
        self.request(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn stop_recording(&self, call_id: &str) -> Result<(), StreamError> {
        let path = format!("{}/stop_recording", self.call_path(call_id));
        self.request(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn list_recordings(
        &self,
        call_id: &str,
    ) -> Result<Vec<RecordingArtifact>, StreamError> {
        let path = format!("{}/recordings", self.call_path(call_id));
        let response = self.request(Method::GET, &path, None).await?;
        let artifacts = response
            .get("recordings")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        Ok(artifacts)
    }

    /// Polls for the processed recording after a stop. Recordings take
    /// a while to process, so this retries on a fixed cadence and
    /// returns the newest artifact once one shows up. Gives up with a
    /// warning when the poll budget runs out; the recording is simply
    /// not persisted in that case.
    pub async fn await_recording(&self, call_id: &str) -> Option<RecordingArtifact> {
        let found = self
            .recording_poll
            .poll(|attempt| async move {
                match self.list_recordings(call_id).await {
                    Ok(artifacts) if !artifacts.is_empty() => artifacts.into_iter().last(),
                    Ok(_) => {
                        debug!("Recording for {call_id} not ready yet (attempt {attempt})");
                        None
                    }
                    Err(e) => {
                        debug!("Recording query for {call_id} failed (attempt {attempt}): {e}");
                        None
                    }
                }
            })
            .await;

        if found.is_none() {
            warn!("No recording available for call {call_id}");
        }
        found
    }

    /// Ends the call for every participant.
    pub async fn end_call(&self, call_id: &str) -> Result<(), StreamError> {
        let path = format!("{}/mark_ended", self.call_path(call_id));
        self.request(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }
}

fn call_summary(value: &Value) -> CallSummary {
    let call = value.get("call").unwrap_or(value);
    CallSummary {
        id: call["id"].as_str().unwrap_or_default().to_string(),
        created_by_id: call["created_by"]["id"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        starts_at: parse_timestamp(&call["starts_at"]),
        ended_at: parse_timestamp(&call["ended_at"]),
        description: call["custom"]["description"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(|s| s.parse().ok())
}
