//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod logging;
pub mod realtime;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::auth::AuthConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::{PresenceConfig, RealtimeConfig};

use crate::error::AppError;

/// Legacy environment variables that override the realtime section.
pub const ENV_SWEEP_INTERVAL: &str = "PRESENCE_SWEEP_INTERVAL_MS";
/// Coalescing window for `presence.updated` broadcasts.
pub const ENV_COALESCE_WINDOW: &str = "PRESENCE_SNAPSHOT_COALESCE_MS";
/// Per-subscriber queue capacity.
pub const ENV_SUBSCRIBER_QUEUE: &str = "HUB_SUBSCRIBER_QUEUE";
/// WebSocket write timeout.
pub const ENV_WRITE_TIMEOUT: &str = "WS_WRITE_TIMEOUT_MS";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Real-time hub and presence settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files and the environment.
    ///
    /// Merges the default configuration with an environment-specific overlay,
    /// environment variables prefixed with `BEACON__`, and finally the
    /// unprefixed realtime variables (`HUB_SUBSCRIBER_QUEUE`, ...).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let mut loaded: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.apply_overrides(|key| std::env::var(key).ok())?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Apply the unprefixed realtime overrides using `lookup` to read values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, ENV_SWEEP_INTERVAL)? {
            self.realtime.presence.sweep_interval_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_COALESCE_WINDOW)? {
            self.realtime.presence.snapshot_coalesce_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_SUBSCRIBER_QUEUE)? {
            self.realtime.subscriber_queue = v as usize;
        }
        if let Some(v) = parse_override(&lookup, ENV_WRITE_TIMEOUT)? {
            self.realtime.ws_write_timeout_ms = v;
        }
        Ok(())
    }

    /// Reject values the realtime engine cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.realtime.subscriber_queue == 0 {
            return Err(AppError::configuration(
                "realtime.subscriber_queue must be greater than zero",
            ));
        }
        if self.realtime.ws_write_timeout_ms == 0 {
            return Err(AppError::configuration(
                "realtime.ws_write_timeout_ms must be greater than zero",
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(AppError::configuration(
                "server.request_timeout_ms must be greater than zero",
            ));
        }
        if self.realtime.presence.sweep_interval_ms == 0 {
            return Err(AppError::configuration(
                "realtime.presence.sweep_interval_ms must be greater than zero",
            ));
        }
        if self.realtime.presence.default_ping_interval_ms == 0
            || self.realtime.presence.default_timeout_multiplier == 0
        {
            return Err(AppError::configuration(
                "presence defaults must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_override<F>(lookup: &F, key: &str) -> Result<Option<u64>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::configuration(format!("{key} must be an integer, got '{raw}'"))),
    }
}
