//! HTTP and WebSocket handlers.

pub mod health;
pub mod presence;
pub mod topics;
pub mod ws;
