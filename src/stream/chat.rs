use log::{info, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{token, ChannelKind, StreamError};
use crate::config::StreamConfig;

/// A chat-side user record as the vendor stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// One video participant to provision on the chat side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ParticipantProfile {
    /// Display name, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionError {
    pub user_id: String,
    pub error: String,
}

/// What came out of provisioning a participant batch: the users now
/// known to the chat side (existing ones included) and per-user
/// failures. A failed participant never aborts the rest.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub created_users: Vec<ChatUser>,
    pub errors: Vec<ProvisionError>,
}

/// How a user ended up inside the meeting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    AddedToExisting,
    Created(ChannelKind),
}

impl JoinOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            JoinOutcome::AddedToExisting => "User added to channel successfully",
            JoinOutcome::Created(ChannelKind::Messaging) => "New channel created successfully",
            JoinOutcome::Created(ChannelKind::Team) => "Team channel created successfully",
            JoinOutcome::Created(ChannelKind::Livestream) => {
                "Livestream channel created successfully"
            }
        }
    }
}

/// REST adapter for the chat side of the SDK.
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl ChatClient {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.chat_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Auth token a client uses to connect as `user_id`.
    pub fn user_token(&self, user_id: &str) -> Result<String, StreamError> {
        if !self.is_configured() {
            return Err(StreamError::NotConfigured);
        }
        token::user_token(&self.api_secret, user_id)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        extra_query: &[(&str, String)],
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
            .query(extra_query)
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

    pub async fn query_users(&self, user_ids: &[String]) -> Result<Vec<ChatUser>, StreamError> {
        let payload = json!({ "filter_conditions": { "id": { "$in": user_ids } } });
        let response = self
            .request(
                Method::GET,
                "/users",
                &[("payload", payload.to_string())],
                None,
            )
            .await?;
        let users = response
            .get("users")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        Ok(users)
    }

    pub async fn upsert_user(&self, user: &ChatUser) -> Result<(), StreamError> {
        let body = json!({ "users": { &user.id: user } });
        self.request(Method::POST, "/users", &[], Some(body)).await?;
        Ok(())
    }

    /// Makes sure every participant has a chat-side user, reusing
    /// records that already exist. Processes the batch sequentially and
    /// collects per-user errors instead of failing the batch.
    pub async fn ensure_users(&self, participants: &[ParticipantProfile]) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        for participant in participants {
            match self.ensure_user(participant).await {
                Ok(user) => report.created_users.push(user),
                Err(e) => report.errors.push(ProvisionError {
                    user_id: participant.user_id.clone(),
                    error: e.to_string(),
                }),
            }
        }
        report
    }

    async fn ensure_user(&self, participant: &ParticipantProfile) -> Result<ChatUser, StreamError> {
        // A failed lookup is treated like a missing user and falls
        // through to the upsert.
        if let Ok(mut existing) = self.query_users(&[participant.user_id.clone()]).await {
            if !existing.is_empty() {
                return Ok(existing.remove(0));
            }
        }

        let user = ChatUser {
            id: participant.user_id.clone(),
            name: participant
                .name
                .clone()
                .unwrap_or_else(|| participant.user_id.clone()),
            image: participant.image.clone(),
        };
        self.upsert_user(&user).await?;
        info!("Created chat user {}", user.id);
        Ok(user)
    }

    pub async fn add_members(
        &self,
        kind: ChannelKind,
        channel_id: &str,
        user_ids: &[String],
    ) -> Result<(), StreamError> {
        let path = format!("/channels/{}/{}", kind.as_str(), channel_id);
        let body = json!({ "add_members": user_ids });
        self.request(Method::POST, &path, &[], Some(body)).await?;
        Ok(())
    }

    /// Creates the meeting channel of the given kind with the user as
    /// first member and creator.
    pub async fn create_meeting_channel(
        &self,
        kind: ChannelKind,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<(), StreamError> {
        let path = format!("/channels/{}/{}/query", kind.as_str(), meeting_id);
        let body = json!({
            "data": {
                "name": format!("Meeting {meeting_id}"),
                "members": [user_id],
                "created_by_id": user_id,
            },
            "state": true,
        });
        self.request(Method::POST, &path, &[], Some(body)).await?;
        Ok(())
    }

    /// Puts the user into the meeting channel: first by joining the
    /// existing one, then by creating it, walking the channel kinds in
    /// fallback order. Only the final alternative failing is an error.
    pub async fn join_channel(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<JoinOutcome, StreamError> {
        if !self.is_configured() {
            return Err(StreamError::NotConfigured);
        }

        match self
            .add_members(ChannelKind::Messaging, meeting_id, &[user_id.to_string()])
            .await
        {
            Ok(()) => return Ok(JoinOutcome::AddedToExisting),
            Err(e) => info!("Could not add user to existing channel, trying to create one: {e}"),
        }

        let mut last_error = StreamError::NotConfigured;
        for kind in ChannelKind::FALLBACK_ORDER {
            match self.create_meeting_channel(kind, meeting_id, user_id).await {
                Ok(()) => {
                    info!(
                        "Channel {} created for meeting {meeting_id} as {}",
                        meeting_id,
                        kind.as_str()
                    );
                    return Ok(JoinOutcome::Created(kind));
                }
                Err(e) => {
                    warn!(
                        "Failed to create {} channel for {meeting_id}: {e}",
                        kind.as_str()
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// User ids currently in the channel's member list.
    pub async fn channel_members(
        &self,
        kind: ChannelKind,
        channel_id: &str,
    ) -> Result<Vec<String>, StreamError> {
        let path = format!("/channels/{}/{}/query", kind.as_str(), channel_id);
        let response = self
            .request(Method::POST, &path, &[], Some(json!({ "state": true })))
            .await?;

        let members = response
            .get("members")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|member| {
                        member
                            .get("user_id")
                            .and_then(Value::as_str)
                            .or_else(|| member.pointer("/user/id").and_then(Value::as_str))
                            .map(str::to_owned)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(members)
    }
}
