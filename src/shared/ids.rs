use chrono::Utc;
use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase base-36 suffix, the tail of every generated id.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Chat message ids look like `{meetingId}_{millis}_{suffix}`.
pub fn message_id(meeting_id: &str) -> String {
    format!(
        "{}_{}_{}",
        meeting_id,
        Utc::now().timestamp_millis(),
        random_suffix(9)
    )
}

/// Recording ids share the message id scheme.
pub fn recording_id(meeting_id: &str) -> String {
    format!(
        "{}_{}_{}",
        meeting_id,
        Utc::now().timestamp_millis(),
        random_suffix(9)
    )
}

/// Presence session ids embed the user so one user has at most one live
/// session id per join.
pub fn session_id(meeting_id: &str, user_id: &str) -> String {
    format!("{}_{}_{}", meeting_id, user_id, Utc::now().timestamp_millis())
}

/// Instant meetings get a fresh UUID as their caller-chosen identifier.
pub fn instant_meeting_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_lowercase_base36() {
        let suffix = random_suffix(9);
        assert_eq!(suffix.len(), 9);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn message_id_embeds_meeting() {
        let id = message_id("meet-42");
        assert!(id.starts_with("meet-42_"));
        assert_eq!(id.split('_').count(), 3);
    }

    #[test]
    fn session_id_embeds_user() {
        let id = session_id("meet-42", "user-7");
        assert!(id.starts_with("meet-42_user-7_"));
    }

    #[test]
    fn instant_ids_are_unique() {
        assert_ne!(instant_meeting_id(), instant_meeting_id());
    }
}
