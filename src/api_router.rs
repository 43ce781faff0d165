//! Combines the API routes of every module into one router.

use axum::Router;
use std::sync::Arc;

use crate::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::api::meetings::configure())
        .merge(crate::api::chat::configure())
        .merge(crate::api::recordings::configure())
        .merge(crate::api::stream::configure())
        .merge(crate::api::transcribe::configure())
        .merge(crate::api::debug::configure())
}
