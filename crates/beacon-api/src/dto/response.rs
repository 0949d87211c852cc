//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use beacon_realtime::metrics::MetricsSnapshot;
use beacon_realtime::topic::TopicDescriptor;

/// `{"status": "ok"}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `ok` on success.
    pub status: String,
}

impl StatusResponse {
    /// The success acknowledgement.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Online user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    /// Online user ids, sorted.
    pub online_users: Vec<String>,
    /// Number of online users.
    pub count: usize,
}

impl From<Vec<String>> for OnlineUsersResponse {
    fn from(online_users: Vec<String>) -> Self {
        Self {
            count: online_users.len(),
            online_users,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Application version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Detailed health check response.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealthResponse {
    /// Service status; `shutting_down` once the hub refuses publishes.
    pub status: String,
    /// Application version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Registered hub subscribers.
    pub subscribers: usize,
    /// Users with a live presence record.
    pub online_users: usize,
    /// Hub counters.
    pub hub: MetricsSnapshot,
    /// Time of the check.
    pub checked_at: DateTime<Utc>,
}

/// Topic catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct TopicsResponse {
    /// Registered topics, sorted by name.
    pub topics: Vec<TopicDescriptor>,
    /// Number of topics.
    pub count: usize,
}
