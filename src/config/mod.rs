use std::env;

/// Default public base URL used to build shareable meeting links.
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

const DEFAULT_VIDEO_BASE_URL: &str = "https://video.stream-io-api.com";
const DEFAULT_CHAT_BASE_URL: &str = "https://chat.stream-io-api.com";
const DEFAULT_ASSEMBLY_API_BASE_URL: &str = "https://api.assemblyai.com";
const DEFAULT_ASSEMBLY_STREAMING_BASE_URL: &str = "https://streaming.assemblyai.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),
}

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub email: EmailConfig,
    pub stream: StreamConfig,
    pub transcription: TranscriptionConfig,
    pub auth: AuthConfig,
    pub base_url: String,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub database: String,
    pub collections: CollectionNames,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
}

/// Collection names, each overridable through the environment.
#[derive(Clone)]
pub struct CollectionNames {
    pub meetings: String,
    pub messages: String,
    pub chat_sessions: String,
    pub invitations: String,
    pub summaries: String,
    pub recordings: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            meetings: "meetings".to_string(),
            messages: "messages".to_string(),
            chat_sessions: "chat_sessions".to_string(),
            invitations: "invitations".to_string(),
            summaries: "meeting_summaries".to_string(),
            recordings: "recordings".to_string(),
        }
    }
}

impl CollectionNames {
    fn from_env() -> Self {
        Self {
            meetings: env_or("MONGODB_MEETINGS_COLLECTION", "meetings"),
            messages: env_or("MONGODB_MESSAGES_COLLECTION", "messages"),
            chat_sessions: env_or("MONGODB_CHAT_SESSIONS_COLLECTION", "chat_sessions"),
            invitations: env_or("MONGODB_INVITATIONS_COLLECTION", "invitations"),
            summaries: env_or("MONGODB_SUMMARIES_COLLECTION", "meeting_summaries"),
            recordings: env_or("MONGODB_RECORDINGS_COLLECTION", "recordings"),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        vec![
            &self.meetings,
            &self.messages,
            &self.chat_sessions,
            &self.invitations,
            &self.summaries,
            &self.recordings,
        ]
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub sender_name: String,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Clone)]
pub struct StreamConfig {
    pub api_key: String,
    pub api_secret: String,
    pub video_base_url: String,
    pub chat_base_url: String,
}

impl StreamConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

#[derive(Clone)]
pub struct TranscriptionConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub streaming_base_url: String,
}

impl TranscriptionConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl AppConfig {
    /// Reads the whole configuration from the environment. The database
    /// connection string is the only hard requirement; everything else
    /// falls back to a sensible default so the server can come up in a
    /// partially configured environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let uri = env_trimmed("MONGODB_URI").ok_or(ConfigError::MissingVar("MONGODB_URI"))?;

        let email_user = env_or("EMAIL_USER", "");
        let email_from = env_trimmed("EMAIL_FROM").unwrap_or_else(|| email_user.clone());

        Ok(Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: env_u16("SERVER_PORT", 8080),
            },
            database: DatabaseConfig {
                uri,
                database: env_or("MONGODB_DB", "wismeet"),
                collections: CollectionNames::from_env(),
                max_pool_size: 10,
                min_pool_size: 2,
            },
            email: EmailConfig {
                host: env_or("EMAIL_HOST", "smtp.gmail.com"),
                port: env_u16("EMAIL_PORT", 587),
                username: email_user,
                password: env_or("EMAIL_PASS", ""),
                from_address: email_from,
                sender_name: "WISMeet".to_string(),
            },
            stream: StreamConfig {
                api_key: env_first(&["STREAM_API_KEY", "NEXT_PUBLIC_STREAM_API_KEY"])
                    .unwrap_or_default(),
                api_secret: env_or("STREAM_SECRET_KEY", ""),
                video_base_url: DEFAULT_VIDEO_BASE_URL.to_string(),
                chat_base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            },
            transcription: TranscriptionConfig {
                api_key: env_or("ASSEMBLY_API_KEY", ""),
                api_base_url: DEFAULT_ASSEMBLY_API_BASE_URL.to_string(),
                streaming_base_url: DEFAULT_ASSEMBLY_STREAMING_BASE_URL.to_string(),
            },
            auth: AuthConfig {
                jwt_secret: env_or("IDENTITY_JWT_SECRET", "wismeet-dev-secret"),
            },
            base_url: env_first(&["BASE_URL", "NEXT_PUBLIC_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn meeting_url(&self, meeting_id: &str) -> String {
        format!("{}/meeting/{}", self.base_url, meeting_id)
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_trimmed(key).unwrap_or_else(|| default.to_string())
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env_trimmed(k))
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_trimmed(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_collection_names() {
        let names = CollectionNames::default();
        assert_eq!(names.meetings, "meetings");
        assert_eq!(names.summaries, "meeting_summaries");
        assert_eq!(names.all().len(), 6);
    }

    #[test]
    fn email_config_requires_credentials() {
        let mut config = EmailConfig {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            sender_name: "WISMeet".to_string(),
        };
        assert!(!config.is_configured());

        config.username = "bot@example.com".to_string();
        config.password = "hunter2".to_string();
        assert!(config.is_configured());
    }

    #[test]
    fn stream_config_requires_both_keys() {
        let config = StreamConfig {
            api_key: "key".to_string(),
            api_secret: String::new(),
            video_base_url: DEFAULT_VIDEO_BASE_URL.to_string(),
            chat_base_url: DEFAULT_CHAT_BASE_URL.to_string(),
        };
        assert!(!config.is_configured());
    }
}
