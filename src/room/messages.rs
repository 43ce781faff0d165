use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::models::{ChatMessage, MessageType};

/// A live channel message as the transport reported it, before the
/// room has classified and buffered it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the transport itself marked the message private.
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Counts from one buffer flush. Individual failures never abort the
/// rest of the batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub saved_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
}

/// Recipient named by an `@user` prefix, the plain-text private
/// message convention. Only the first token counts, and a bare `@`
/// names nobody.
pub fn parse_private_prefix(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('@')?;
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let recipient = &rest[..end];
    if recipient.is_empty() {
        None
    } else {
        Some(recipient)
    }
}

/// Turns a transport message into the stored shape. A transport-level
/// private flag is authoritative; otherwise the `@recipient` prefix
/// marks the message private.
pub fn tag_message(meeting_id: &str, incoming: IncomingMessage) -> ChatMessage {
    let (is_private, recipient_id) = if incoming.is_private {
        (true, incoming.recipient_id)
    } else if let Some(recipient) = parse_private_prefix(&incoming.text) {
        (true, Some(recipient.to_string()))
    } else {
        (false, None)
    };

    ChatMessage {
        message_id: String::new(),
        meeting_id: meeting_id.to_string(),
        sender_id: incoming.sender_id,
        sender_name: incoming
            .sender_name
            .unwrap_or_else(|| "Anonymous".to_string()),
        message: incoming.text,
        message_type: MessageType::Text,
        timestamp: incoming.timestamp,
        is_private,
        recipient_id,
        file_url: None,
        file_name: None,
    }
}

/// Chat messages collected during a call, held until the end-of-call
/// flush writes them through the persistence facade.
#[derive(Debug)]
pub struct MessageBuffer {
    meeting_id: String,
    messages: Vec<ChatMessage>,
}

impl MessageBuffer {
    pub fn new(meeting_id: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn record(&mut self, incoming: IncomingMessage) {
        let message = tag_message(&self.meeting_id, incoming);
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Hands the buffered messages to the caller and empties the
    /// buffer. Messages that fail to persist are not restored.
    pub fn drain(&mut self) -> Vec<ChatMessage> {
        std::mem::take(&mut self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(text: &str) -> IncomingMessage {
        IncomingMessage {
            sender_id: "u1".to_string(),
            sender_name: Some("Ada".to_string()),
            text: text.to_string(),
            timestamp: Utc::now(),
            is_private: false,
            recipient_id: None,
        }
    }

    #[test]
    fn test_parse_private_prefix() {
        assert_eq!(parse_private_prefix("@bob hello"), Some("bob"));
        assert_eq!(parse_private_prefix("@bob"), Some("bob"));
        assert_eq!(parse_private_prefix("hello @bob"), None);
        assert_eq!(parse_private_prefix("@"), None);
        assert_eq!(parse_private_prefix("@ hello"), None);
        assert_eq!(parse_private_prefix("plain text"), None);
    }

    #[test]
    fn test_tag_message_prefix_marks_private() {
        let message = tag_message("m1", incoming("@bob secret"));
        assert!(message.is_private);
        assert_eq!(message.recipient_id.as_deref(), Some("bob"));
        assert_eq!(message.message, "@bob secret");
    }

    #[test]
    fn test_tag_message_transport_flag_is_authoritative() {
        let mut raw = incoming("no prefix here");
        raw.is_private = true;
        raw.recipient_id = Some("carol".to_string());

        let message = tag_message("m1", raw);
        assert!(message.is_private);
        assert_eq!(message.recipient_id.as_deref(), Some("carol"));
    }

    #[test]
    fn test_tag_message_defaults() {
        let mut raw = incoming("hello everyone");
        raw.sender_name = None;

        let message = tag_message("m1", raw);
        assert!(!message.is_private);
        assert_eq!(message.recipient_id, None);
        assert_eq!(message.sender_name, "Anonymous");
        assert_eq!(message.meeting_id, "m1");
        assert!(message.message_id.is_empty());
    }

    #[test]
    fn test_buffer_records_and_drains() {
        let mut buffer = MessageBuffer::new("m1");
        assert!(buffer.is_empty());

        buffer.record(incoming("first"));
        buffer.record(incoming("@bob second"));
        assert_eq!(buffer.len(), 2);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained[1].is_private);
        assert!(buffer.is_empty());
    }
}
