//! Subscriber registry and non-blocking fan-out router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RealtimeError;
use crate::message::{EventPayload, Message};
use crate::metrics::HubMetrics;
use crate::topic::{TopicDescriptor, TopicRegistry};

use super::subscriber::{CloseReason, QueuedMessage, Subscriber, SubscriberId};

/// Result of a successful publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// Subscribers the message was enqueued for.
    pub delivered: usize,
    /// Matching subscribers whose queue refused it.
    pub dropped: usize,
}

/// Commands processed by the control task.
#[derive(Debug)]
enum HubCommand {
    /// Remove a subscriber that was marked as a slow consumer.
    Evict(SubscriberId),
}

struct Entry {
    subscriber: Arc<Subscriber>,
    sender: mpsc::Sender<QueuedMessage>,
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<SubscriberId, Entry>,
    next_sequence: u64,
    last_published_at: Option<DateTime<Utc>>,
    shutting_down: bool,
}

impl HubState {
    /// Next sequence number and a publish time never earlier than the last.
    fn stamp(&mut self, now: DateTime<Utc>) -> (u64, DateTime<Utc>) {
        self.next_sequence += 1;
        let at = self.last_published_at.map_or(now, |last| last.max(now));
        self.last_published_at = Some(at);
        (self.next_sequence, at)
    }
}

/// Owns the subscriber set and routes published messages into subscriber
/// queues.
pub struct Hub {
    registry: Arc<TopicRegistry>,
    state: Mutex<HubState>,
    control_tx: mpsc::UnboundedSender<HubCommand>,
    control_rx: Mutex<Option<mpsc::UnboundedReceiver<HubCommand>>>,
    metrics: Arc<HubMetrics>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Hub {
    /// Creates a hub validating against `registry`.
    pub fn new(registry: Arc<TopicRegistry>, metrics: Arc<HubMetrics>) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            state: Mutex::new(HubState::default()),
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Topic registry used for validation.
    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    /// Counters.
    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    /// Adds a subscriber. Registering the same handle again is a no-op.
    pub fn register(&self, subscriber: &Arc<Subscriber>) -> Result<SubscriberId, RealtimeError> {
        let id = subscriber.id();
        let mut state = self.lock();

        if state.shutting_down {
            return Err(RealtimeError::ShuttingDown);
        }
        if state.subscribers.contains_key(&id) {
            return Ok(id);
        }
        if subscriber.is_closed() {
            return Err(RealtimeError::SubscriberClosed(id.as_u64()));
        }
        let Some(sender) = subscriber.take_sender() else {
            return Err(RealtimeError::SubscriberClosed(id.as_u64()));
        };

        state.subscribers.insert(
            id,
            Entry {
                subscriber: subscriber.clone(),
                sender,
            },
        );
        let total = state.subscribers.len();
        drop(state);

        self.metrics.record_registered();
        info!(
            subscriber_id = %id,
            user_id = %subscriber.user_id(),
            client_id = %subscriber.client_id(),
            topics = ?subscriber.filter().patterns(),
            total,
            "Subscriber registered"
        );
        Ok(id)
    }

    /// Removes a subscriber and closes its queue. Unknown ids are ignored.
    pub fn unregister(&self, id: SubscriberId) {
        self.remove(id, CloseReason::Unregistered);
    }

    fn remove(&self, id: SubscriberId, reason: CloseReason) -> bool {
        let entry = self.lock().subscribers.remove(&id);
        let Some(entry) = entry else {
            return false;
        };

        drop(entry.sender);
        entry.subscriber.close(reason);
        self.metrics.record_unregistered();
        info!(
            subscriber_id = %id,
            user_id = %entry.subscriber.user_id(),
            reason = ?entry.subscriber.close_reason(),
            "Subscriber unregistered"
        );
        true
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Routes `msg` to every matching subscriber without waiting.
    ///
    /// A subscriber whose queue is full is counted as dropped, stops receiving
    /// immediately, and is removed by the control task.
    pub fn publish(&self, mut msg: Message) -> Result<PublishOutcome, RealtimeError> {
        if msg.target_user_id.as_deref() == Some("") {
            msg.target_user_id = None;
        }
        self.registry
            .resolve_published(&msg.topic, msg.target_user_id.as_deref())?;

        let mut outcome = PublishOutcome::default();
        let mut evicted = Vec::new();
        {
            let mut state = self.lock();
            if state.shutting_down {
                return Err(RealtimeError::ShuttingDown);
            }

            (msg.sequence, msg.published_at) = state.stamp(Utc::now());
            let msg = Arc::new(msg);

            for (id, entry) in &state.subscribers {
                let subscriber = &entry.subscriber;
                if subscriber.is_closed() || !subscriber.accepts(&msg) {
                    continue;
                }
                match entry.sender.try_send(msg.clone()) {
                    Ok(()) => outcome.delivered += 1,
                    Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                        outcome.dropped += 1;
                        if subscriber.mark(CloseReason::Evicted) {
                            evicted.push(*id);
                        }
                    }
                }
            }
        }

        self.metrics.record_publish(outcome.delivered, outcome.dropped);
        for id in evicted {
            self.metrics.record_eviction();
            warn!(
                subscriber_id = %id,
                error = %RealtimeError::QueueOverflow(id.as_u64()),
                "Slow consumer evicted"
            );
            // The receiver lives as long as the hub.
            let _ = self.control_tx.send(HubCommand::Evict(id));
        }

        Ok(outcome)
    }

    /// Publishes a typed payload, checking it against the topic's shape.
    pub fn publish_event(
        &self,
        topic: &str,
        target_user_id: Option<&str>,
        payload: EventPayload,
    ) -> Result<PublishOutcome, RealtimeError> {
        let descriptor: TopicDescriptor = self.registry.resolve_published(topic, target_user_id)?;
        if descriptor.payload != payload.shape() {
            return Err(RealtimeError::PayloadMismatch {
                topic: topic.to_string(),
                expected: descriptor.payload.as_str(),
            });
        }

        let mut msg = Message::broadcast(topic, payload.encode()?);
        msg.target_user_id = target_user_id.map(str::to_string);
        self.publish(msg)
    }

    /// Processes eviction commands until `shutdown` fires.
    ///
    /// Only the first call gets the command stream; later calls return at once.
    pub async fn run_control(self: Arc<Self>, shutdown: CancellationToken) {
        let rx = self
            .control_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut rx) = rx else {
            warn!("Hub control task already running");
            return;
        };

        debug!("Hub control task started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(HubCommand::Evict(id)) => {
                        self.remove(id, CloseReason::Evicted);
                    }
                    None => break,
                },
            }
        }
        debug!("Hub control task stopped");
    }

    /// Refuses further publishes and registrations and closes every
    /// subscriber with [`CloseReason::Shutdown`].
    pub fn shutdown(&self) -> usize {
        let entries: Vec<Entry> = {
            let mut state = self.lock();
            state.shutting_down = true;
            state.subscribers.drain().map(|(_, e)| e).collect()
        };

        let closed = entries.len();
        for entry in entries {
            drop(entry.sender);
            entry.subscriber.close(CloseReason::Shutdown);
            self.metrics.record_unregistered();
        }
        info!(closed, "Hub shut down");
        closed
    }

    /// Whether `shutdown` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}
