//! WebSocket upgrade handlers.
//!
//! Each endpoint authenticates before the upgrade, then binds the socket to
//! a fresh hub subscriber and hands both halves to a `ClientSession`.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::future;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use beacon_realtime::SubscriberFilter;
use beacon_realtime::connection::{
    ClientSession, IgnoreInbound, InboundFrame, InboundHandler, OutboundFrame, PresenceInbound,
};
use beacon_realtime::topic::catalogue::{DATA_TOPICS, HTML_TOPICS, PRESENCE_TOPICS};

use crate::dto::request::WsQuery;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /ws/html
pub async fn html_socket(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<WsQuery>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    Ok(upgrade(
        state,
        auth,
        query,
        ws,
        SubscriberFilter::topics([HTML_TOPICS]),
        IgnoreInbound,
    ))
}

/// GET /ws/data
pub async fn data_socket(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<WsQuery>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    Ok(upgrade(
        state,
        auth,
        query,
        ws,
        SubscriberFilter::topics([DATA_TOPICS]),
        IgnoreInbound,
    ))
}

/// GET /ws/presence
///
/// Inbound `heartbeat` and `offline` frames are applied to the socket's own
/// user and client.
pub async fn presence_socket(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<WsQuery>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let handler = PresenceInbound::new(state.realtime.presence.clone());
    Ok(upgrade(
        state,
        auth,
        query,
        ws,
        SubscriberFilter::topics([PRESENCE_TOPICS]),
        handler,
    ))
}

fn upgrade<H>(
    state: AppState,
    auth: AuthUser,
    query: WsQuery,
    ws: WebSocketUpgrade,
    filter: SubscriberFilter,
    handler: H,
) -> Response
where
    H: InboundHandler + 'static,
{
    let client_id = query
        .client_id
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    ws.on_upgrade(move |socket| run_socket(state, auth, client_id, filter, handler, socket))
}

async fn run_socket<H>(
    state: AppState,
    auth: AuthUser,
    client_id: String,
    filter: SubscriberFilter,
    handler: H,
    socket: WebSocket,
) where
    H: InboundHandler + 'static,
{
    let engine = &state.realtime;
    let pair = engine.subscriber(auth.user_id.clone(), client_id, filter);
    let session = ClientSession::new(engine.hub.clone(), pair, handler, engine.session_config());
    let subscriber_id = session.subscriber().id();

    info!(
        subscriber_id = %subscriber_id,
        user_id = %auth.user_id,
        client_id = %session.subscriber().client_id(),
        "WebSocket connection established"
    );

    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: OutboundFrame| {
        future::ready(Ok::<_, axum::Error>(to_ws_message(frame)))
    });
    let stream = stream.map(|result| result.map(from_ws_message));

    if let Err(e) = engine.track_session(session.run(sink, stream)).await {
        warn!(
            subscriber_id = %subscriber_id,
            user_id = %auth.user_id,
            error = %e,
            "WebSocket session ended with error"
        );
    }
}

/// Payloads that are valid UTF-8 go out as text, anything else as binary.
fn to_ws_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Payload(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        },
        OutboundFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

fn from_ws_message(message: Message) -> InboundFrame {
    match message {
        Message::Text(text) => InboundFrame::Text(text.as_str().to_owned()),
        Message::Binary(bytes) => InboundFrame::Binary(bytes),
        Message::Ping(_) | Message::Pong(_) => InboundFrame::Control,
        Message::Close(_) => InboundFrame::Close,
    }
}
