use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::TranscriptionConfig;

/// Lifetime of a streaming transcription token, in seconds.
const TOKEN_TTL_SECS: u32 = 600;

const ASSISTANT_MODEL: &str = "anthropic/claude-sonnet-4-20250514";
const ASSISTANT_CONTEXT: &str = "This is a conversation during a video call.";

#[derive(Debug, Clone)]
pub enum TranscribeError {
    NotConfigured,
    Network(String),
    Api { status: u16, message: String },
}

impl std::fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "Transcription API key is not configured"),
            Self::Network(e) => write!(f, "Transcription request failed: {e}"),
            Self::Api { status, message } => {
                write!(f, "Transcription API error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for TranscribeError {}

impl From<reqwest::Error> for TranscribeError {
    fn from(err: reqwest::Error) -> Self {
        TranscribeError::Network(err.to_string())
    }
}

/// Live-transcription support for the in-call captions and the
/// meeting assistant.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Mints a short-lived token a browser can open a streaming
    /// transcription session with.
    async fn streaming_token(&self) -> Result<String, TranscribeError>;

    /// Forwards a question asked during the call to the LLM endpoint
    /// and returns its answer.
    async fn assistant_reply(&self, prompt: &str) -> Result<String, TranscribeError>;
}

fn assistant_prompt(question: &str) -> String {
    format!(
        "You act as an assistant during a video call. You get a question and I want you to answer it directly without repeating it.\n  If you do not know the answer, clearly state that.\n  Here is the user question:\n  {question}"
    )
}

pub struct TranscriptionClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    streaming_base_url: String,
}

impl TranscriptionClient {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            streaming_base_url: config.streaming_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, TranscribeError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TranscriptionProvider for TranscriptionClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn streaming_token(&self) -> Result<String, TranscribeError> {
        if !self.is_configured() {
            return Err(TranscribeError::NotConfigured);
        }
        let url = format!("{}/v3/token", self.streaming_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("expires_in_seconds", TOKEN_TTL_SECS)])
            .header("Authorization", &self.api_key)
            .send()
            .await?;
        let body = Self::read_json(response).await?;
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    async fn assistant_reply(&self, prompt: &str) -> Result<String, TranscribeError> {
        if !self.is_configured() {
            return Err(TranscribeError::NotConfigured);
        }
        let url = format!("{}/lemur/v3/generate/task", self.api_base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", &self.api_key)
            .json(&json!({
                "prompt": assistant_prompt(prompt),
                "input_text": ASSISTANT_CONTEXT,
                "final_model": ASSISTANT_MODEL,
            }))
            .send()
            .await?;
        let body = Self::read_json(response).await?;
        Ok(body["response"].as_str().unwrap_or_default().to_string())
    }
}
