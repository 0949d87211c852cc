//! Request DTOs with validation.

use serde::Deserialize;
use validator::Validate;

use crate::error::ApiError;

/// `POST /presence/heartbeat` form.
///
/// Numeric fields arrive as text so a malformed value is reported as
/// `BAD_HEARTBEAT` instead of a generic form rejection.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HeartbeatForm {
    /// Client instance id.
    #[validate(
        required(message = "client_id is required"),
        length(min = 1, message = "client_id is required")
    )]
    pub client_id: Option<String>,
    /// Free-form client label, e.g. `browser`.
    pub client_type: Option<String>,
    /// Expected ping interval in milliseconds.
    pub ping_interval_ms: Option<String>,
    /// Missed intervals tolerated before expiry.
    pub timeout_multiplier: Option<String>,
}

impl HeartbeatForm {
    /// Parses `ping_interval_ms`; blank counts as absent.
    pub fn ping_interval_ms(&self) -> Result<Option<i64>, ApiError> {
        parse_integer("ping_interval_ms", self.ping_interval_ms.as_deref())
    }

    /// Parses `timeout_multiplier`; blank counts as absent.
    pub fn timeout_multiplier(&self) -> Result<Option<i64>, ApiError> {
        parse_integer("timeout_multiplier", self.timeout_multiplier.as_deref())
    }
}

/// `POST /presence/offline` form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct OfflineForm {
    /// Client instance going offline.
    #[validate(
        required(message = "client_id is required"),
        length(min = 1, message = "client_id is required")
    )]
    pub client_id: Option<String>,
}

/// Query accepted by the WebSocket endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsQuery {
    /// Client instance id; a random one is assigned when absent.
    pub client_id: Option<String>,
}

fn parse_integer(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| {
            ApiError::bad_request("BAD_HEARTBEAT", format!("{field} must be an integer"))
        }),
    }
}

/// Validates a form, reporting failures as `MISSING_CLIENT_ID`.
pub fn require_client_id<T: Validate>(form: &T) -> Result<(), ApiError> {
    form.validate()
        .map_err(|_| ApiError::bad_request("MISSING_CLIENT_ID", "client_id is required"))
}
