//! Errors surfaced by the hub, topic registry, client sessions, and presence.

use thiserror::Error;

use beacon_core::error::{AppError, ErrorKind};

/// Errors produced by the real-time core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// Publish (or resolve) of a topic that was never registered.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
    /// A topic with the same name is already registered.
    #[error("topic '{0}' is already registered")]
    DuplicateTopic(String),
    /// Topic name is malformed.
    #[error("invalid topic '{name}': {reason}")]
    InvalidTopic {
        /// Offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// Registration attempted after the registry was sealed.
    #[error("topic registry is sealed; cannot register '{0}'")]
    RegistryClosed(String),
    /// Message targets do not fit the topic kind (direct vs broadcast).
    #[error("invalid target for topic '{topic}': {reason}")]
    InvalidTarget {
        /// Published topic name.
        topic: String,
        /// Why the target was rejected.
        reason: &'static str,
    },
    /// Payload shape does not match the shape the topic is bound to.
    #[error("payload for topic '{topic}' must be {expected}")]
    PayloadMismatch {
        /// Published topic name.
        topic: String,
        /// Shape the topic is registered with.
        expected: &'static str,
    },
    /// A typed payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(String),
    /// A subscriber queue was full at publish time.
    #[error("subscriber {0} queue overflow")]
    QueueOverflow(u64),
    /// Register called with a subscriber handle that was already closed.
    #[error("subscriber {0} is closed")]
    SubscriberClosed(u64),
    /// Heartbeat failed validation.
    #[error("bad heartbeat: {0}")]
    BadHeartbeat(&'static str),
    /// Writing to the client socket failed or timed out.
    #[error("socket write failed: {0}")]
    SocketWrite(String),
    /// Reading from the client socket failed.
    #[error("socket read failed: {0}")]
    SocketRead(String),
    /// The hub is shutting down and refuses new work.
    #[error("hub is shutting down")]
    ShuttingDown,
}

impl RealtimeError {
    /// Machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTopic(_) => "UNKNOWN_TOPIC",
            Self::DuplicateTopic(_) => "DUPLICATE_TOPIC",
            Self::InvalidTopic { .. } => "INVALID_TOPIC",
            Self::RegistryClosed(_) => "REGISTRY_CLOSED",
            Self::InvalidTarget { .. } => "INVALID_TARGET",
            Self::PayloadMismatch { .. } => "PAYLOAD_MISMATCH",
            Self::Encode(_) => "ENCODE",
            Self::QueueOverflow(_) => "QUEUE_OVERFLOW",
            Self::SubscriberClosed(_) => "SUBSCRIBER_CLOSED",
            Self::BadHeartbeat(_) => "BAD_HEARTBEAT",
            Self::SocketWrite(_) => "SOCKET_WRITE",
            Self::SocketRead(_) => "SOCKET_READ",
            Self::ShuttingDown => "SHUTTING_DOWN",
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTopic(_) => ErrorKind::NotFound,
            Self::DuplicateTopic(_) | Self::InvalidTopic { .. } | Self::RegistryClosed(_) => {
                ErrorKind::Configuration
            }
            Self::InvalidTarget { .. }
            | Self::PayloadMismatch { .. }
            | Self::BadHeartbeat(_) => ErrorKind::Validation,
            Self::SubscriberClosed(_) => ErrorKind::Conflict,
            Self::ShuttingDown => ErrorKind::ServiceUnavailable,
            Self::Encode(_) => ErrorKind::Serialization,
            Self::QueueOverflow(_) | Self::SocketWrite(_) | Self::SocketRead(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        let code = err.code();
        AppError::new(err.kind(), err.to_string()).with_code(code)
    }
}
