//! Per-connection read and write pumps.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use beacon_core::config::RealtimeConfig;

use crate::error::RealtimeError;
use crate::hub::{CloseReason, Hub, Subscriber, SubscriberId, SubscriberQueue};

use super::frame::{InboundFrame, OutboundFrame};
use super::inbound::InboundHandler;

/// Timeouts applied by the pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Per-frame write timeout.
    pub write_timeout: Duration,
    /// How long a write pump may keep flushing after hub shutdown.
    pub drain_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            drain_grace: Duration::from_secs(2),
        }
    }
}

impl From<&RealtimeConfig> for SessionConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            write_timeout: Duration::from_millis(config.ws_write_timeout_ms),
            drain_grace: Duration::from_millis(config.shutdown_drain_ms),
        }
    }
}

/// What happened over the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Subscriber handle.
    pub subscriber_id: SubscriberId,
    /// Payload frames written.
    pub frames_written: usize,
    /// Queued messages discarded at exit.
    pub discarded: usize,
    /// Why the subscriber was closed.
    pub close_reason: Option<CloseReason>,
}

#[derive(Debug, Default)]
struct WriteOutcome {
    written: usize,
    discarded: usize,
}

/// Binds one socket to one subscriber.
pub struct ClientSession<H> {
    hub: Arc<Hub>,
    subscriber: Arc<Subscriber>,
    queue: SubscriberQueue,
    handler: H,
    config: SessionConfig,
}

impl<H> std::fmt::Debug for ClientSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("subscriber", &self.subscriber)
            .field("config", &self.config)
            .finish()
    }
}

impl<H: InboundHandler> ClientSession<H> {
    /// Creates a session for a subscriber that is not yet registered.
    pub fn new(
        hub: Arc<Hub>,
        (subscriber, queue): (Arc<Subscriber>, SubscriberQueue),
        handler: H,
        config: SessionConfig,
    ) -> Self {
        Self {
            hub,
            subscriber,
            queue,
            handler,
            config,
        }
    }

    /// Subscriber driven by this session.
    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }

    /// Registers the subscriber and runs both pumps until either ends.
    ///
    /// The write pump runs on its own task; the read pump runs on the caller's.
    /// Ending either one unregisters the subscriber, which stops the other.
    pub async fn run<S, R, E>(self, mut sink: S, mut stream: R) -> Result<SessionSummary, RealtimeError>
    where
        S: Sink<OutboundFrame> + Send + Unpin + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<InboundFrame, E>> + Unpin,
        E: Display,
    {
        let Self {
            hub,
            subscriber,
            queue,
            handler,
            config,
        } = self;
        let id = subscriber.id();

        if let Err(e) = hub.register(&subscriber) {
            warn!(subscriber_id = %id, error = %e, "Subscriber registration refused");
            let _ = send_frame(&mut sink, OutboundFrame::normal_close(e.code()), config.write_timeout).await;
            let _ = timeout(config.write_timeout, sink.close()).await;
            return Err(e);
        }

        let writer = tokio::spawn(write_pump(hub.clone(), queue, sink, config));

        loop {
            tokio::select! {
                _ = subscriber.closed() => break,
                frame = stream.next() => match frame {
                    Some(Ok(InboundFrame::Text(text))) => handler.on_text(&subscriber, &text).await,
                    Some(Ok(InboundFrame::Binary(data))) => {
                        debug!(subscriber_id = %id, len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(InboundFrame::Control)) => {}
                    Some(Ok(InboundFrame::Close)) | None => {
                        debug!(subscriber_id = %id, "Client closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(
                            subscriber_id = %id,
                            user_id = %subscriber.user_id(),
                            error = %RealtimeError::SocketRead(e.to_string()),
                            "Read pump failed"
                        );
                        break;
                    }
                },
            }
        }

        hub.unregister(id);
        let outcome = writer.await.unwrap_or_else(|e| {
            warn!(subscriber_id = %id, error = %e, "Write pump task failed");
            WriteOutcome::default()
        });

        let summary = SessionSummary {
            subscriber_id: id,
            frames_written: outcome.written,
            discarded: outcome.discarded,
            close_reason: subscriber.close_reason(),
        };
        info!(
            subscriber_id = %id,
            user_id = %subscriber.user_id(),
            client_id = %subscriber.client_id(),
            frames_written = summary.frames_written,
            discarded = summary.discarded,
            reason = ?summary.close_reason,
            "Client session ended"
        );
        Ok(summary)
    }
}

async fn send_frame<S>(sink: &mut S, frame: OutboundFrame, limit: Duration) -> Result<(), RealtimeError>
where
    S: Sink<OutboundFrame> + Unpin,
    S::Error: Display,
{
    match timeout(limit, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RealtimeError::SocketWrite(e.to_string())),
        Err(_) => Err(RealtimeError::SocketWrite(format!(
            "timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

async fn write_pump<S>(
    hub: Arc<Hub>,
    mut queue: SubscriberQueue,
    mut sink: S,
    config: SessionConfig,
) -> WriteOutcome
where
    S: Sink<OutboundFrame> + Unpin,
    S::Error: Display,
{
    let subscriber = queue.subscriber().clone();
    let id = subscriber.id();
    let mut outcome = WriteOutcome::default();
    let mut failed = false;

    while let Some(msg) = queue.recv().await {
        match send_frame(&mut sink, OutboundFrame::Payload(msg.payload.clone()), config.write_timeout).await {
            Ok(()) => {
                outcome.written += 1;
                hub.metrics().record_frame_written();
            }
            Err(e) => {
                warn!(
                    subscriber_id = %id,
                    user_id = %subscriber.user_id(),
                    error = %e,
                    "Write pump failed"
                );
                failed = true;
                hub.unregister(id);
                break;
            }
        }
    }

    if !failed && subscriber.close_reason() == Some(CloseReason::Shutdown) {
        let deadline = Instant::now() + config.drain_grace;
        while let Some(msg) = queue.try_recv() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if send_frame(&mut sink, OutboundFrame::Payload(msg.payload.clone()), remaining)
                .await
                .is_err()
            {
                failed = true;
                break;
            }
            outcome.written += 1;
            hub.metrics().record_frame_written();
        }
    }

    outcome.discarded = queue.drain();
    if outcome.discarded > 0 {
        hub.metrics().record_discarded(outcome.discarded);
        debug!(subscriber_id = %id, discarded = outcome.discarded, "Discarded queued messages");
    }

    if !failed {
        let reason = match subscriber.close_reason() {
            Some(CloseReason::Shutdown) => "server shutting down",
            Some(CloseReason::Evicted) => "slow consumer",
            _ => "",
        };
        let _ = send_frame(&mut sink, OutboundFrame::normal_close(reason), config.write_timeout).await;
    }
    let _ = timeout(config.write_timeout, sink.close()).await;

    debug!(subscriber_id = %id, written = outcome.written, "Write pump exited");
    outcome
}
