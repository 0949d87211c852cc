//! Real-time hub and presence configuration.

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket fan-out) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Bounded outbound queue capacity per subscriber.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
    /// Socket write timeout in milliseconds. Exceeding it tears the client down.
    #[serde(default = "default_write_timeout")]
    pub ws_write_timeout_ms: u64,
    /// How long a write pump may keep flushing on shutdown, in milliseconds.
    #[serde(default = "default_shutdown_drain")]
    pub shutdown_drain_ms: u64,
    /// Presence tracking settings.
    #[serde(default)]
    pub presence: PresenceConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            subscriber_queue: default_subscriber_queue(),
            ws_write_timeout_ms: default_write_timeout(),
            shutdown_drain_ms: default_shutdown_drain(),
            presence: PresenceConfig::default(),
        }
    }
}

/// Heartbeat-driven presence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Interval between sweeps for expired records, in milliseconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
    /// Minimum interval between `presence.updated` broadcasts, in milliseconds.
    #[serde(default = "default_coalesce")]
    pub snapshot_coalesce_ms: u64,
    /// Ping interval assumed when a heartbeat does not declare one.
    #[serde(default = "default_ping_interval")]
    pub default_ping_interval_ms: u64,
    /// Timeout multiplier assumed when a heartbeat does not declare one.
    #[serde(default = "default_timeout_multiplier")]
    pub default_timeout_multiplier: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval(),
            snapshot_coalesce_ms: default_coalesce(),
            default_ping_interval_ms: default_ping_interval(),
            default_timeout_multiplier: default_timeout_multiplier(),
        }
    }
}

fn default_subscriber_queue() -> usize {
    256
}

fn default_write_timeout() -> u64 {
    10_000
}

fn default_shutdown_drain() -> u64 {
    2_000
}

fn default_sweep_interval() -> u64 {
    5_000
}

fn default_coalesce() -> u64 {
    250
}

fn default_ping_interval() -> u64 {
    30_000
}

fn default_timeout_multiplier() -> u32 {
    3
}
