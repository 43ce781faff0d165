pub mod chat;
pub mod token;
pub mod video;

pub use chat::{ChatClient, ChatUser, JoinOutcome, ParticipantProfile, ProvisionError, ProvisionReport};
pub use video::{CallMember, CallSpec, CallSummary, RecordingArtifact, VideoClient};

#[derive(Debug, Clone)]
pub enum StreamError {
    NotConfigured,
    Token(String),
    Network(String),
    Api { status: u16, message: String },
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "Stream API configuration is missing"),
            Self::Token(e) => write!(f, "Failed to sign Stream token: {e}"),
            Self::Network(e) => write!(f, "Stream request failed: {e}"),
            Self::Api { status, message } => write!(f, "Stream API error ({status}): {message}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Network(err.to_string())
    }
}

/// Channel flavors tried when setting up a meeting chat, in fallback
/// order. Creation failures walk down the list; only the last failure
/// is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Messaging,
    Team,
    Livestream,
}

impl ChannelKind {
    pub const FALLBACK_ORDER: [ChannelKind; 3] = [
        ChannelKind::Messaging,
        ChannelKind::Team,
        ChannelKind::Livestream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Messaging => "messaging",
            ChannelKind::Team => "team",
            ChannelKind::Livestream => "livestream",
        }
    }
}
