//! Topic descriptors, name validation, and pattern matching.

use serde::{Deserialize, Serialize};

use crate::error::RealtimeError;

/// Placeholder a direct topic carries in its terminal segment.
pub const RECIPIENT_PLACEHOLDER: &str = "{recipient}";

/// Delivery semantics of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    /// Delivered to every subscriber whose allow-list includes the topic.
    Broadcast,
    /// Delivered only to subscribers of the recipient user.
    Direct,
}

/// Schema tag binding a topic to the shape of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// Opaque HTML fragment.
    Html,
    /// Opaque JSON document chosen by the producer.
    Json,
    /// `{"user_id": ".."}`.
    PresenceUser,
    /// `{"users": [..], "count": N}`.
    PresenceSnapshot,
}

/// A registered broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescriptor {
    /// Unique dot-segmented name; direct topics end in `{recipient}`.
    pub name: String,
    /// Broadcast or direct, derived from the name.
    pub kind: TopicKind,
    /// Human-readable description.
    pub description: String,
    /// Example of a published name or payload.
    pub example: String,
    /// Payload schema tag.
    pub payload: PayloadShape,
}

impl TopicDescriptor {
    /// Builds a descriptor, validating the name and deriving the kind.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        example: impl Into<String>,
        payload: PayloadShape,
    ) -> Result<Self, RealtimeError> {
        let name = name.into();
        let kind = validate_name(&name)?;
        Ok(Self {
            name,
            kind,
            description: description.into(),
            example: example.into(),
            payload,
        })
    }

    /// Returns true for `{recipient}` topics.
    pub fn is_direct(&self) -> bool {
        self.kind == TopicKind::Direct
    }

    /// The part of a direct topic name before the placeholder, e.g. `bridge.html.direct.`.
    pub fn direct_prefix(&self) -> Option<&str> {
        self.name.strip_suffix(RECIPIENT_PLACEHOLDER)
    }

    /// Concrete name for `recipient`; `None` for broadcast topics.
    pub fn for_recipient(&self, recipient: &str) -> Option<String> {
        self.direct_prefix()
            .map(|prefix| format!("{prefix}{recipient}"))
    }

    /// Matches a published name against this topic.
    pub fn matches(&self, published: &str, recipient: Option<&str>) -> bool {
        matches(published, &self.name, recipient)
    }
}

/// Returns true iff `published` equals `pattern` after substituting the
/// placeholder with `recipient`. A direct pattern never matches without a
/// non-empty recipient.
pub fn matches(published: &str, pattern: &str, recipient: Option<&str>) -> bool {
    match pattern.strip_suffix(RECIPIENT_PLACEHOLDER) {
        Some(prefix) => match recipient {
            Some(r) if !r.is_empty() => published.strip_prefix(prefix) == Some(r),
            _ => false,
        },
        None => published == pattern,
    }
}

/// Validates a topic name and returns the kind it implies.
pub fn validate_name(name: &str) -> Result<TopicKind, RealtimeError> {
    let invalid = |reason: &'static str| RealtimeError::InvalidTopic {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid("name contains whitespace"));
    }
    if !name.is_ascii() {
        return Err(invalid("name must be ASCII"));
    }
    if name.matches(RECIPIENT_PLACEHOLDER).count() > 1 {
        return Err(invalid("at most one placeholder is allowed"));
    }

    let segments: Vec<&str> = name.split('.').collect();
    let last = segments.len() - 1;
    let mut kind = TopicKind::Broadcast;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(invalid("name has an empty segment"));
        }
        if *segment == RECIPIENT_PLACEHOLDER {
            if i != last || last == 0 {
                return Err(invalid("placeholder is only allowed as the terminal segment"));
            }
            kind = TopicKind::Direct;
            continue;
        }
        if segment.contains('{') || segment.contains('}') {
            return Err(invalid("placeholder is only allowed as the terminal segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("segments may only contain letters, digits, '_' and '-'"));
        }
    }

    Ok(kind)
}
