//! Typed payloads keyed on the topic's payload shape.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::RealtimeError;
use crate::topic::PayloadShape;

/// Body of `presence.user.online` and `presence.user.offline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUserPayload {
    /// User whose state changed.
    pub user_id: String,
}

/// Body of `presence.updated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshotPayload {
    /// Sorted online user ids.
    pub users: Vec<String>,
    /// `users.len()`.
    pub count: usize,
}

impl PresenceSnapshotPayload {
    /// Builds a snapshot from an already sorted user list.
    pub fn new(users: Vec<String>) -> Self {
        let count = users.len();
        Self { users, count }
    }
}

/// A payload tagged with the shape it satisfies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// HTML fragment.
    Html(Bytes),
    /// Producer-defined JSON document.
    Json(Bytes),
    /// A single presence transition.
    PresenceUser(PresenceUserPayload),
    /// Online user snapshot.
    PresenceSnapshot(PresenceSnapshotPayload),
}

impl EventPayload {
    /// Shape tag of this payload.
    pub fn shape(&self) -> PayloadShape {
        match self {
            Self::Html(_) => PayloadShape::Html,
            Self::Json(_) => PayloadShape::Json,
            Self::PresenceUser(_) => PayloadShape::PresenceUser,
            Self::PresenceSnapshot(_) => PayloadShape::PresenceSnapshot,
        }
    }

    /// Wire bytes.
    pub fn encode(&self) -> Result<Bytes, RealtimeError> {
        match self {
            Self::Html(b) | Self::Json(b) => Ok(b.clone()),
            Self::PresenceUser(p) => Ok(Bytes::from(serde_json::to_vec(p)?)),
            Self::PresenceSnapshot(p) => Ok(Bytes::from(serde_json::to_vec(p)?)),
        }
    }
}

impl PayloadShape {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::PresenceUser => "presence_user",
            Self::PresenceSnapshot => "presence_snapshot",
        }
    }
}
