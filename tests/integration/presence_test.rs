//! Integration tests for the presence endpoints, catalogue, and health checks.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};

use beacon_realtime::SubscriberFilter;
use beacon_realtime::topic::catalogue::{PRESENCE_TOPICS, PRESENCE_UPDATED, PRESENCE_USER_ONLINE};

#[tokio::test]
async fn test_heartbeat_requires_token() {
    let app = helpers::TestApp::new();

    let response = app
        .post_form("/presence/heartbeat", "client_id=tab-1", None)
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "UNAUTHORIZED");

    let response = app
        .post_form("/presence/heartbeat", "client_id=tab-1", Some("not-a-jwt"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_heartbeat_requires_client_id() {
    let app = helpers::TestApp::new();
    let token = app.token("alice");

    for form in ["", "client_id=", "client_type=browser"] {
        let response = app
            .post_form("/presence/heartbeat", form, Some(&token))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "form {form:?}");
        assert_eq!(response.body["error"], "MISSING_CLIENT_ID");
    }
    assert!(app.engine.presence.get_online_users().is_empty());
}

#[tokio::test]
async fn test_heartbeat_rejects_bad_timing() {
    let app = helpers::TestApp::new();
    let token = app.token("alice");

    for form in [
        "client_id=tab-1&ping_interval_ms=soon",
        "client_id=tab-1&ping_interval_ms=0",
        "client_id=tab-1&timeout_multiplier=-2",
    ] {
        let response = app
            .post_form("/presence/heartbeat", form, Some(&token))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "form {form:?}");
        assert_eq!(response.body["error"], "BAD_HEARTBEAT");
    }
    assert!(app.engine.presence.get_online_users().is_empty());
}

#[tokio::test]
async fn test_heartbeat_then_offline() {
    let app = helpers::TestApp::new();
    let token = app.token("alice");

    let response = app
        .post_form(
            "/presence/heartbeat",
            "client_id=tab-1&client_type=browser&ping_interval_ms=1000&timeout_multiplier=3",
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"status": "ok"}));

    let response = app.get("/presence", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"online_users": ["alice"], "count": 1}));

    let record = app
        .engine
        .presence
        .get_presence("alice")
        .expect("alice should be present");
    assert_eq!(record.client_type, "browser");
    assert_eq!(record.ttl(), Duration::from_millis(3000));

    let response = app
        .post_form("/presence/offline", "client_id=tab-1", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/presence", None).await;
    assert_eq!(response.body, json!({"online_users": [], "count": 0}));
}

#[tokio::test]
async fn test_offline_for_unknown_client_is_ok() {
    let app = helpers::TestApp::new();
    let token = app.token("bob");

    let response = app
        .post_form("/presence/offline", "client_id=never-seen", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.post_form("/presence/offline", "", Some(&token)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "MISSING_CLIENT_ID");
}

#[tokio::test]
async fn test_presence_html_is_escaped() {
    let app = helpers::TestApp::new();
    let token = app.token("<script>");

    app.post_form("/presence/heartbeat", "client_id=tab-1", Some(&token))
        .await;

    let response = app.get("/presence/html", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(
        response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/html"))
    );
    assert!(response.text.contains("&lt;script&gt;"));
    assert!(!response.text.contains("<script>"));
}

#[tokio::test]
async fn test_heartbeat_announces_user_online() {
    let app = helpers::TestApp::new();
    let (observer, mut queue) = app.engine.subscriber(
        "",
        "observer",
        SubscriberFilter::topics([PRESENCE_TOPICS]),
    );
    app.engine.hub.register(&observer).expect("register observer");

    let token = app.token("carol");
    app.post_form("/presence/heartbeat", "client_id=phone", Some(&token))
        .await;

    let online = tokio::time::timeout(Duration::from_secs(1), queue.recv())
        .await
        .expect("online event")
        .expect("queue open");
    assert_eq!(online.topic, PRESENCE_USER_ONLINE);
    let payload: Value = serde_json::from_slice(&online.payload).expect("json payload");
    assert_eq!(payload, json!({"user_id": "carol"}));

    let updated = tokio::time::timeout(Duration::from_secs(1), queue.recv())
        .await
        .expect("snapshot event")
        .expect("queue open");
    assert_eq!(updated.topic, PRESENCE_UPDATED);
    let payload: Value = serde_json::from_slice(&updated.payload).expect("json payload");
    assert_eq!(payload, json!({"users": ["carol"], "count": 1}));

    // A repeated heartbeat refreshes the snapshot but does not announce again.
    app.post_form("/presence/heartbeat", "client_id=phone", Some(&token))
        .await;
    let next = tokio::time::timeout(Duration::from_secs(1), queue.recv())
        .await
        .expect("snapshot event")
        .expect("queue open");
    assert_eq!(next.topic, PRESENCE_UPDATED);
}

#[tokio::test]
async fn test_topic_catalogue() {
    let app = helpers::TestApp::new();

    let response = app.get("/api/topics", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["count"], 7);

    let names: Vec<&str> = response.body["topics"]
        .as_array()
        .expect("topics array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"bridge.html.direct.{recipient}"));
    assert!(names.contains(&"presence.updated"));
}

#[tokio::test]
async fn test_health_checks() {
    let app = helpers::TestApp::new();

    let response = app.get("/api/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.body["uptime_seconds"].is_u64());

    let response = app.get("/api/health/detailed", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["subscribers"], 0);
    assert_eq!(response.body["online_users"], 0);
    assert!(response.body["hub"]["published"].is_u64());

    app.engine.shutdown().await;
    let response = app.get("/api/health/detailed", None).await;
    assert_eq!(response.body["status"], "shutting_down");
}
