use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use dotenvy::dotenv;
use log::{info, warn};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use wismeet::api_router::configure_api_routes;
use wismeet::config::AppConfig;
use wismeet::db::MeetingStore;
use wismeet::email::EmailService;
use wismeet::shared::state::AppState;
use wismeet::stream::{ChatClient, VideoClient};
use wismeet::transcribe::TranscriptionClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let store = MeetingStore::connect(&config.database)
        .await
        .context("Failed to connect to the meeting database")?;
    if let Err(e) = store.ensure_collections().await {
        warn!("Collection audit failed: {e}");
    }
    if let Err(e) = store.ensure_indexes().await {
        warn!("Index provisioning failed: {e}");
    }

    let email = EmailService::new(&config.email).context("Failed to build the email transport")?;
    if !email.is_configured() {
        warn!("Email credentials not set; invitation delivery will fail");
    }
    if !config.stream.is_configured() {
        warn!("Stream API credentials not set; video/chat endpoints will return errors");
    }
    if !config.transcription.is_configured() {
        warn!("Transcription API key not set; transcription endpoints will return errors");
    }

    let state = Arc::new(AppState {
        store: Arc::new(store),
        email: Arc::new(email),
        video: Arc::new(VideoClient::new(&config.stream)),
        chat: Arc::new(ChatClient::new(&config.stream)),
        transcriber: Arc::new(TranscriptionClient::new(&config.transcription)),
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(configure_api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()
    .context("Invalid server bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr} - is another instance running?"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install shutdown handler: {e}");
        return;
    }
    info!("Shutdown signal received");
}
