//! # beacon-api
//!
//! HTTP API layer for Beacon built on Axum.
//!
//! Exposes the presence heartbeat and offline endpoints, the WebSocket
//! upgrades that bind sockets to hub subscribers, the topic catalogue, and
//! health checks. Realtime behaviour lives in `beacon-realtime`; this crate
//! only authenticates, validates, and translates.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod view;

pub use app::{build_app, serve};
pub use error::ApiError;
pub use state::AppState;
