use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::MeetingStore;
use crate::email::EmailService;
use crate::stream::chat::ChatClient;
use crate::stream::video::VideoClient;
use crate::transcribe::TranscriptionProvider;

/// Process-wide handles, constructed once at startup and shared with every
/// handler through axum state.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<MeetingStore>,
    pub email: Arc<EmailService>,
    pub video: Arc<VideoClient>,
    pub chat: Arc<ChatClient>,
    pub transcriber: Arc<dyn TranscriptionProvider>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            email: Arc::clone(&self.email),
            video: Arc::clone(&self.video),
            chat: Arc::clone(&self.chat),
            transcriber: Arc::clone(&self.transcriber),
        }
    }
}
