pub mod chat;
pub mod debug;
pub mod meetings;
pub mod recordings;
pub mod stream;
pub mod transcribe;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

pub(crate) fn missing_fields_named(missing: &[&str]) -> (StatusCode, Json<Value>) {
    bad_request(&format!("Missing required fields: {}", missing.join(", ")))
}

/// 400 naming every absent required field, or None when the payload is
/// complete. `fields` pairs each wire name with whether it was present.
pub(crate) fn missing_fields(fields: &[(&str, bool)]) -> Option<(StatusCode, Json<Value>)> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing_fields_named(&missing))
    }
}
