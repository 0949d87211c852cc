//! Handlers for text frames received by the read pump.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::hub::Subscriber;
use crate::message::InboundMessage;
use crate::presence::{Heartbeat, PresenceService};

/// Receives inbound text frames for one endpoint.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Called for every text frame, in arrival order.
    async fn on_text(&self, subscriber: &Subscriber, text: &str);
}

/// Discards inbound frames; used by the pure-broadcast endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreInbound;

#[async_trait]
impl InboundHandler for IgnoreInbound {
    async fn on_text(&self, subscriber: &Subscriber, text: &str) {
        debug!(
            subscriber_id = %subscriber.id(),
            len = text.len(),
            "Ignoring inbound frame"
        );
    }
}

/// Routes presence commands to the presence service for the socket's own
/// user and client.
#[derive(Debug, Clone)]
pub struct PresenceInbound {
    presence: Arc<PresenceService>,
}

impl PresenceInbound {
    /// Creates a handler bound to `presence`.
    pub fn new(presence: Arc<PresenceService>) -> Self {
        Self { presence }
    }
}

#[async_trait]
impl InboundHandler for PresenceInbound {
    async fn on_text(&self, subscriber: &Subscriber, text: &str) {
        let command: InboundMessage = match serde_json::from_str(text) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    subscriber_id = %subscriber.id(),
                    error = %e,
                    "Discarding malformed presence frame"
                );
                return;
            }
        };

        let result = match command {
            InboundMessage::Heartbeat {
                client_type,
                ping_interval_ms,
                timeout_multiplier,
            } => self
                .presence
                .heartbeat(Heartbeat {
                    user_id: subscriber.user_id().to_string(),
                    client_id: subscriber.client_id().to_string(),
                    client_type,
                    ping_interval_ms,
                    timeout_multiplier,
                })
                .map(|_| ()),
            InboundMessage::Offline => self
                .presence
                .offline(subscriber.user_id(), subscriber.client_id())
                .map(|_| ()),
        };

        if let Err(e) = result {
            warn!(
                subscriber_id = %subscriber.id(),
                user_id = %subscriber.user_id(),
                error = %e,
                "Presence command rejected"
            );
        }
    }
}
