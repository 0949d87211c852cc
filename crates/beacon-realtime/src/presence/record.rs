//! Liveness records and heartbeat input.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::RealtimeError;

/// Client type recorded when a heartbeat does not declare one.
pub const UNKNOWN_CLIENT_TYPE: &str = "unknown";

/// Upper bound on a record's lifetime.
pub const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A liveness ping for one (user, client) pair.
///
/// Absent numeric fields fall back to the configured defaults; present ones
/// must be positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heartbeat {
    /// Authenticated user.
    pub user_id: String,
    /// Client-chosen id.
    pub client_id: String,
    /// Free-form client type.
    pub client_type: Option<String>,
    /// Declared ping interval in milliseconds.
    pub ping_interval_ms: Option<i64>,
    /// Missed pings tolerated before expiry.
    pub timeout_multiplier: Option<i64>,
}

impl Heartbeat {
    /// A heartbeat with default timing.
    pub fn new(user_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the declared timing.
    pub fn timing(mut self, ping_interval_ms: i64, timeout_multiplier: i64) -> Self {
        self.ping_interval_ms = Some(ping_interval_ms);
        self.timeout_multiplier = Some(timeout_multiplier);
        self
    }
}

/// Liveness state of one (user, client) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    /// User id.
    pub user_id: String,
    /// Client id.
    pub client_id: String,
    /// Client type, `unknown` when not declared.
    pub client_type: String,
    /// Declared ping interval.
    pub ping_interval_ms: u64,
    /// Declared timeout multiplier.
    pub timeout_multiplier: u32,
    /// Wall clock of the last heartbeat.
    pub last_seen: DateTime<Utc>,
    /// `last_seen + ping_interval_ms * timeout_multiplier`.
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) seen_at: Instant,
    #[serde(skip)]
    pub(crate) deadline: Instant,
}

impl PresenceRecord {
    /// Builds a record for a validated heartbeat observed at `now`.
    pub(crate) fn new(
        user_id: String,
        client_id: String,
        client_type: String,
        ping_interval_ms: u64,
        timeout_multiplier: u32,
        now: Instant,
    ) -> Self {
        let ttl = Duration::from_millis(ping_interval_ms)
            .saturating_mul(timeout_multiplier)
            .min(MAX_TTL);
        let last_seen = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|d| last_seen.checked_add_signed(d))
            .unwrap_or(last_seen);

        Self {
            user_id,
            client_id,
            client_type,
            ping_interval_ms,
            timeout_multiplier,
            last_seen,
            expires_at,
            seen_at: now,
            deadline: now + ttl,
        }
    }

    /// Whether the record is still live at `now`.
    pub fn is_live_at(&self, now: Instant) -> bool {
        self.deadline > now
    }

    /// Lifetime granted by the last heartbeat.
    pub fn ttl(&self) -> Duration {
        self.deadline.saturating_duration_since(self.seen_at)
    }
}

pub(crate) struct ValidHeartbeat {
    pub user_id: String,
    pub client_id: String,
    pub client_type: String,
    pub ping_interval_ms: u64,
    pub timeout_multiplier: u32,
}

/// Validates a heartbeat, filling absent timing from the defaults.
pub(crate) fn validate(
    hb: Heartbeat,
    default_ping_interval_ms: u64,
    default_timeout_multiplier: u32,
) -> Result<ValidHeartbeat, RealtimeError> {
    let user_id = hb.user_id.trim();
    if user_id.is_empty() {
        return Err(RealtimeError::BadHeartbeat("user_id is required"));
    }
    let client_id = hb.client_id.trim();
    if client_id.is_empty() {
        return Err(RealtimeError::BadHeartbeat("client_id is required"));
    }

    let ping_interval_ms = match hb.ping_interval_ms {
        None => default_ping_interval_ms,
        Some(v) if v > 0 => v as u64,
        Some(_) => return Err(RealtimeError::BadHeartbeat("ping_interval_ms must be positive")),
    };
    let timeout_multiplier = match hb.timeout_multiplier {
        None => default_timeout_multiplier,
        Some(v) if v > 0 => u32::try_from(v)
            .map_err(|_| RealtimeError::BadHeartbeat("timeout_multiplier is too large"))?,
        Some(_) => return Err(RealtimeError::BadHeartbeat("timeout_multiplier must be positive")),
    };

    let client_type = hb
        .client_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_CLIENT_TYPE.to_string());

    Ok(ValidHeartbeat {
        user_id: user_id.to_string(),
        client_id: client_id.to_string(),
        client_type,
        ping_interval_ms,
        timeout_multiplier,
    })
}
