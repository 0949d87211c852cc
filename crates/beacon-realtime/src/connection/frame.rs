//! Transport-neutral WebSocket frames.

use bytes::Bytes;

/// Close code sent on every orderly session end.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Frames the write pump emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// One message payload. Sent as a text frame when it is valid UTF-8.
    Payload(Bytes),
    /// Close frame.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Short reason.
        reason: String,
    },
}

impl OutboundFrame {
    /// A normal-closure close frame.
    pub fn normal_close(reason: impl Into<String>) -> Self {
        Self::Close {
            code: NORMAL_CLOSURE,
            reason: reason.into(),
        }
    }
}

/// Frames the read pump consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// UTF-8 text.
    Text(String),
    /// Binary data.
    Binary(Bytes),
    /// Ping or pong control frame.
    Control,
    /// Close frame from the peer.
    Close,
}
