//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use beacon_api::{AppState, build_app};
use beacon_auth::JwtEncoder;
use beacon_core::config::AppConfig;
use beacon_realtime::RealtimeEngine;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Engine behind the router, for publishing and inspection
    pub engine: Arc<RealtimeEngine>,
    /// Application config
    pub config: AppConfig,
    encoder: JwtEncoder,
}

/// Status plus decoded body of a test response
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// JSON body, or `Null` when the body is not JSON
    pub body: Value,
    /// Raw body text
    pub text: String,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
}

impl TestApp {
    /// Create a new test application with a started engine
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-test-secret".to_string();
        config.realtime.presence.snapshot_coalesce_ms = 20;
        config.realtime.shutdown_drain_ms = 200;

        let engine =
            Arc::new(RealtimeEngine::new(config.realtime.clone()).expect("engine should build"));
        engine.start();

        let encoder = JwtEncoder::new(&config.auth);
        let router = build_app(AppState::new(config.clone(), engine.clone()));

        Self {
            router,
            engine,
            config,
            encoder,
        }
    }

    /// Access token for `user_id`
    pub fn token(&self, user_id: &str) -> String {
        self.encoder
            .issue_access_token(user_id, user_id)
            .expect("token should issue")
            .access_token
    }

    /// Sends a request without a body
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut req = Request::builder().method("GET").uri(path);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::empty()).expect("Failed to build request"))
            .await
    }

    /// Sends a form-encoded POST
    pub async fn post_form(&self, path: &str, form: &str, token: Option<&str>) -> TestResponse {
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(
            req.body(Body::from(form.to_string()))
                .expect("Failed to build request"),
        )
        .await
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            body,
            text,
            content_type,
        }
    }

    /// Serves the app on an ephemeral port; cancel the token to stop it
    pub async fn spawn_server(&self) -> (SocketAddr, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let stop = CancellationToken::new();

        let app = self.router.clone();
        let signal = stop.clone();
        tokio::spawn(async move {
            let _ = beacon_api::serve(listener, app, async move { signal.cancelled().await }).await;
        });

        (addr, stop)
    }

    /// Waits until the hub holds `count` subscribers
    pub async fn wait_for_subscribers(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.engine.hub.subscriber_count() != count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {count} subscribers, have {}",
                self.engine.hub.subscriber_count()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
