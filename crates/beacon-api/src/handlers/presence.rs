//! Presence handlers: heartbeat, offline, and the online user snapshot.

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::response::Html;
use tracing::debug;

use beacon_realtime::presence::Heartbeat;

use crate::dto::request::{HeartbeatForm, OfflineForm, require_client_id};
use crate::dto::response::{OnlineUsersResponse, StatusResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;
use crate::view;

/// POST /presence/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    auth: AuthUser,
    form: Result<Form<HeartbeatForm>, FormRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Form(form) = form?;
    require_client_id(&form)?;

    let heartbeat = Heartbeat {
        user_id: auth.user_id,
        client_id: form.client_id.clone().unwrap_or_default(),
        client_type: form.client_type.clone(),
        ping_interval_ms: form.ping_interval_ms()?,
        timeout_multiplier: form.timeout_multiplier()?,
    };

    let record = state.realtime.presence.heartbeat(heartbeat)?;
    debug!(
        user_id = %record.user_id,
        client_id = %record.client_id,
        ttl_ms = record.ttl().as_millis() as u64,
        "Heartbeat accepted"
    );

    Ok(Json(StatusResponse::ok()))
}

/// POST /presence/offline
pub async fn offline(
    State(state): State<AppState>,
    auth: AuthUser,
    form: Result<Form<OfflineForm>, FormRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Form(form) = form?;
    require_client_id(&form)?;

    let client_id = form.client_id.unwrap_or_default();
    state.realtime.presence.offline(&auth.user_id, &client_id)?;

    Ok(Json(StatusResponse::ok()))
}

/// GET /presence
pub async fn online_users(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    Json(state.realtime.presence.get_online_users().into())
}

/// GET /presence/html
pub async fn online_users_html(State(state): State<AppState>) -> Html<String> {
    Html(view::render_online_users(
        &state.realtime.presence.get_online_users(),
    ))
}
