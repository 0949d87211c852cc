//! The value object routed by the hub.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::topic::RECIPIENT_PLACEHOLDER;

/// A message published to the hub.
///
/// `sequence` and `published_at` are assigned by the hub when the message is
/// accepted; values set by the producer are overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Published topic name, with the recipient substituted for direct topics.
    pub topic: String,
    /// Opaque payload bytes (JSON or HTML).
    pub payload: Bytes,
    /// Recipient user; required for direct topics, absent for broadcast ones.
    pub target_user_id: Option<String>,
    /// Narrows delivery to one client of the recipient.
    pub target_client_id: Option<String>,
    /// Informational.
    pub sender_user_id: Option<String>,
    /// Hub-wide publish sequence.
    pub sequence: u64,
    /// Wall clock at publish.
    pub published_at: DateTime<Utc>,
}

impl Message {
    /// A broadcast message.
    pub fn broadcast(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            target_user_id: None,
            target_client_id: None,
            sender_user_id: None,
            sequence: 0,
            published_at: Utc::now(),
        }
    }

    /// A direct message for `recipient` on a `{recipient}` topic template.
    pub fn direct(template: &str, recipient: &str, payload: impl Into<Bytes>) -> Self {
        let topic = template.replace(RECIPIENT_PLACEHOLDER, recipient);
        let mut msg = Self::broadcast(topic, payload);
        msg.target_user_id = Some(recipient.to_string());
        msg
    }

    /// Narrows delivery to a single client.
    pub fn to_client(mut self, client_id: impl Into<String>) -> Self {
        self.target_client_id = Some(client_id.into());
        self
    }

    /// Records the producing user.
    pub fn from_user(mut self, user_id: impl Into<String>) -> Self {
        self.sender_user_id = Some(user_id.into());
        self
    }

    /// Payload as UTF-8, if it is.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_substitutes_recipient() {
        let msg = Message::direct("bridge.html.direct.{recipient}", "alice", "<p>hi</p>")
            .to_client("c1")
            .from_user("system");
        assert_eq!(msg.topic, "bridge.html.direct.alice");
        assert_eq!(msg.target_user_id.as_deref(), Some("alice"));
        assert_eq!(msg.target_client_id.as_deref(), Some("c1"));
        assert_eq!(msg.sender_user_id.as_deref(), Some("system"));
        assert_eq!(msg.payload_str(), Some("<p>hi</p>"));
    }

    #[test]
    fn test_broadcast_has_no_target() {
        let msg = Message::broadcast("bridge.data.broadcast", Bytes::from_static(b"{\"x\":1}"));
        assert!(msg.target_user_id.is_none());
        assert_eq!(msg.sequence, 0);
    }
}
