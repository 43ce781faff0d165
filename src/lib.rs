pub mod api;
pub mod api_router;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod reconcile;
pub mod room;
pub mod shared;
pub mod stream;
pub mod transcribe;
