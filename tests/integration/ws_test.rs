//! End-to-end tests for the WebSocket endpoints over a real socket.

mod helpers;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use beacon_realtime::Message as HubMessage;
use beacon_realtime::topic::catalogue::{
    BRIDGE_DATA_BROADCAST, BRIDGE_DATA_DIRECT, BRIDGE_HTML_BROADCAST,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr, path: &str, token: &str, client_id: &str) -> Client {
    let url = format!("ws://{addr}{path}?token={token}&client_id={client_id}");
    let (ws, _) = connect_async(url).await.expect("WebSocket connect");
    ws
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_upgrade_without_token_is_rejected() {
    let app = helpers::TestApp::new();
    let (addr, _stop) = app.spawn_server().await;

    match connect_async(format!("ws://{addr}/ws/html")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("upgrade should be refused"),
    }
    assert_eq!(app.engine.hub.subscriber_count(), 0);
}

#[tokio::test]
async fn test_html_broadcast_fan_out() {
    let app = helpers::TestApp::new();
    let (addr, _stop) = app.spawn_server().await;

    let mut alice = connect(addr, "/ws/html", &app.token("alice"), "a1").await;
    let mut bob = connect(addr, "/ws/html", &app.token("bob"), "b1").await;
    let mut data = connect(addr, "/ws/data", &app.token("carol"), "c1").await;
    app.wait_for_subscribers(3).await;

    let outcome = app
        .engine
        .hub
        .publish(HubMessage::broadcast(BRIDGE_HTML_BROADCAST, "<p>one</p>"))
        .expect("publish");
    assert_eq!(outcome.delivered, 2);
    assert_eq!(outcome.dropped, 0);

    app.engine
        .hub
        .publish(HubMessage::broadcast(BRIDGE_HTML_BROADCAST, "<p>two</p>"))
        .expect("publish");

    for ws in [&mut alice, &mut bob] {
        assert_eq!(next_text(ws).await, "<p>one</p>");
        assert_eq!(next_text(ws).await, "<p>two</p>");
    }

    app.engine
        .hub
        .publish(HubMessage::broadcast(BRIDGE_DATA_BROADCAST, "{\"n\":1}"))
        .expect("publish");
    assert_eq!(next_text(&mut data).await, "{\"n\":1}");
}

#[tokio::test]
async fn test_direct_message_reaches_only_recipient() {
    let app = helpers::TestApp::new();
    let (addr, _stop) = app.spawn_server().await;

    let mut alice = connect(addr, "/ws/data", &app.token("alice"), "a1").await;
    let mut bob = connect(addr, "/ws/data", &app.token("bob"), "b1").await;
    app.wait_for_subscribers(2).await;

    let outcome = app
        .engine
        .hub
        .publish(HubMessage::direct(BRIDGE_DATA_DIRECT, "bob", "{\"for\":\"bob\"}"))
        .expect("publish");
    assert_eq!(outcome.delivered, 1);

    assert_eq!(next_text(&mut bob).await, "{\"for\":\"bob\"}");
    assert!(
        tokio::time::timeout(Duration::from_millis(150), alice.next())
            .await
            .is_err(),
        "alice must not receive bob's message"
    );
}

#[tokio::test]
async fn test_presence_socket_heartbeat() {
    let app = helpers::TestApp::new();
    let (addr, _stop) = app.spawn_server().await;

    let mut ws = connect(addr, "/ws/presence", &app.token("dave"), "laptop").await;
    app.wait_for_subscribers(1).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    ws.send(Message::Text(
        "{\"type\":\"heartbeat\",\"client_type\":\"desktop\"}".into(),
    ))
    .await
    .expect("send");

    assert_eq!(next_text(&mut ws).await, "{\"user_id\":\"dave\"}");
    assert_eq!(
        next_text(&mut ws).await,
        "{\"users\":[\"dave\"],\"count\":1}"
    );

    let record = app
        .engine
        .presence
        .get_presence("dave")
        .expect("dave should be present");
    assert_eq!(record.client_id, "laptop");
    assert_eq!(record.client_type, "desktop");

    ws.send(Message::Text("{\"type\":\"offline\"}".into()))
        .await
        .expect("send");
    assert_eq!(next_text(&mut ws).await, "{\"user_id\":\"dave\"}");
    assert!(app.engine.presence.get_online_users().is_empty());
}

#[tokio::test]
async fn test_shutdown_sends_normal_closure() {
    let app = helpers::TestApp::new();
    let (addr, stop) = app.spawn_server().await;

    let mut ws = connect(addr, "/ws/html", &app.token("erin"), "e1").await;
    app.wait_for_subscribers(1).await;

    app.engine
        .hub
        .publish(HubMessage::broadcast(BRIDGE_HTML_BROADCAST, "last"))
        .expect("publish");
    app.engine.shutdown().await;

    let mut payloads = Vec::new();
    let close = loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => payloads.push(text.as_str().to_owned()),
            Message::Close(frame) => break frame,
            _ => {}
        }
    };

    assert_eq!(payloads, vec!["last".to_string()]);
    let frame = close.expect("close frame");
    assert_eq!(frame.code, CloseCode::Normal);
    assert_eq!(app.engine.hub.subscriber_count(), 0);

    assert!(
        app.engine
            .hub
            .publish(HubMessage::broadcast(BRIDGE_HTML_BROADCAST, "late"))
            .is_err()
    );
    stop.cancel();
}
