//! The standard topic catalogue registered at startup.

use crate::error::RealtimeError;

use super::descriptor::{PayloadShape, TopicDescriptor};
use super::registry::TopicRegistry;

/// HTML fragment for every `/ws/html` subscriber.
pub const BRIDGE_HTML_BROADCAST: &str = "bridge.html.broadcast";
/// HTML fragment for one user.
pub const BRIDGE_HTML_DIRECT: &str = "bridge.html.direct.{recipient}";
/// JSON document for every `/ws/data` subscriber.
pub const BRIDGE_DATA_BROADCAST: &str = "bridge.data.broadcast";
/// JSON document for one user.
pub const BRIDGE_DATA_DIRECT: &str = "bridge.data.direct.{recipient}";
/// A user went from offline to online.
pub const PRESENCE_USER_ONLINE: &str = "presence.user.online";
/// A user's last live client went away.
pub const PRESENCE_USER_OFFLINE: &str = "presence.user.offline";
/// Coalesced snapshot of the online user set.
pub const PRESENCE_UPDATED: &str = "presence.updated";

/// Allow-list pattern for `/ws/html`.
pub const HTML_TOPICS: &str = "bridge.html.*";
/// Allow-list pattern for `/ws/data`.
pub const DATA_TOPICS: &str = "bridge.data.*";
/// Allow-list pattern for `/ws/presence`.
pub const PRESENCE_TOPICS: &str = "presence.*";

/// Descriptors for every built-in topic.
pub fn standard_topics() -> Result<Vec<TopicDescriptor>, RealtimeError> {
    Ok(vec![
        TopicDescriptor::new(
            BRIDGE_HTML_BROADCAST,
            "HTML fragment pushed to all HTML subscribers",
            "<div id=\"feed\">...</div>",
            PayloadShape::Html,
        )?,
        TopicDescriptor::new(
            BRIDGE_HTML_DIRECT,
            "HTML fragment pushed to the recipient user only",
            "bridge.html.direct.alice",
            PayloadShape::Html,
        )?,
        TopicDescriptor::new(
            BRIDGE_DATA_BROADCAST,
            "JSON document pushed to all data subscribers",
            "{\"x\":1}",
            PayloadShape::Json,
        )?,
        TopicDescriptor::new(
            BRIDGE_DATA_DIRECT,
            "JSON document pushed to the recipient user only",
            "bridge.data.direct.alice",
            PayloadShape::Json,
        )?,
        TopicDescriptor::new(
            PRESENCE_USER_ONLINE,
            "A user came online",
            "{\"user_id\":\"alice\"}",
            PayloadShape::PresenceUser,
        )?,
        TopicDescriptor::new(
            PRESENCE_USER_OFFLINE,
            "A user went offline",
            "{\"user_id\":\"alice\"}",
            PayloadShape::PresenceUser,
        )?,
        TopicDescriptor::new(
            PRESENCE_UPDATED,
            "Snapshot of online users, at most one per coalescing window",
            "{\"users\":[\"alice\",\"bob\"],\"count\":2}",
            PayloadShape::PresenceSnapshot,
        )?,
    ])
}

/// Registers the built-in topics. Does not seal the registry.
pub fn register_standard(registry: &TopicRegistry) -> Result<(), RealtimeError> {
    for topic in standard_topics()? {
        registry.register(topic)?;
    }
    Ok(())
}
