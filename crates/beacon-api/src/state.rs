//! Shared application state passed to all handlers.

use std::sync::Arc;
use std::time::Instant;

use beacon_auth::JwtDecoder;
use beacon_core::config::AppConfig;
use beacon_realtime::RealtimeEngine;

/// Application state available to every handler through `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Hub, presence service, and topic catalogue.
    pub realtime: Arc<RealtimeEngine>,
    /// JWT access-token validator.
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Builds the state around an already constructed engine.
    pub fn new(config: AppConfig, realtime: Arc<RealtimeEngine>) -> Self {
        let jwt_decoder = Arc::new(JwtDecoder::new(&config.auth));
        Self {
            config: Arc::new(config),
            realtime,
            jwt_decoder,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was built.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
