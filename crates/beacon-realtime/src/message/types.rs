//! Commands a client may send over the presence socket.

use serde::{Deserialize, Serialize};

/// Inbound frames accepted on `/ws/presence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Liveness ping for the socket's own client.
    Heartbeat {
        /// Free-form client type.
        #[serde(default)]
        client_type: Option<String>,
        /// Client ping interval; server default when absent.
        #[serde(default)]
        ping_interval_ms: Option<i64>,
        /// Missed pings before expiry; server default when absent.
        #[serde(default)]
        timeout_multiplier: Option<i64>,
    },
    /// Explicit goodbye for the socket's own client.
    Offline,
}
