//! A single connected consumer and its bounded outbound queue.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::Message;

use super::filter::SubscriberFilter;

/// Default queue capacity per subscriber.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a subscriber stopped receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Removed by `Hub::unregister` (socket closed or failed).
    Unregistered,
    /// Queue was full at publish time.
    Evicted,
    /// The hub is shutting down.
    Shutdown,
}

/// Item type carried by subscriber queues.
pub type QueuedMessage = Arc<Message>;

/// One connected consumer.
pub struct Subscriber {
    id: SubscriberId,
    user_id: String,
    client_id: String,
    filter: SubscriberFilter,
    capacity: usize,
    cancel: CancellationToken,
    close_reason: OnceLock<CloseReason>,
    /// Producer half, handed to the hub on first registration.
    pending: Mutex<Option<mpsc::Sender<QueuedMessage>>>,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("client_id", &self.client_id)
            .field("filter", &self.filter)
            .field("capacity", &self.capacity)
            .field("close_reason", &self.close_reason.get())
            .finish()
    }
}

impl Subscriber {
    /// Creates a subscriber and the consumer half of its queue.
    ///
    /// A zero capacity is raised to one.
    pub fn new(
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        filter: SubscriberFilter,
        capacity: usize,
    ) -> (Arc<Self>, SubscriberQueue) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();

        let subscriber = Arc::new(Self {
            id: SubscriberId::next(),
            user_id: user_id.into(),
            client_id: client_id.into(),
            filter,
            capacity,
            cancel: cancel.clone(),
            close_reason: OnceLock::new(),
            pending: Mutex::new(Some(tx)),
        });

        let queue = SubscriberQueue {
            subscriber: subscriber.clone(),
            rx,
            cancel,
        };

        (subscriber, queue)
    }

    /// Handle id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Authenticated user; empty for anonymous subscribers.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Client-chosen id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Delivery filter.
    pub fn filter(&self) -> &SubscriberFilter {
        &self.filter
    }

    /// Whether `msg` should be delivered to this subscriber.
    pub fn accepts(&self, msg: &Message) -> bool {
        self.filter.accepts(msg, &self.user_id, &self.client_id)
    }

    /// Reason the subscriber was closed, if it was.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Whether the subscriber was closed or marked for eviction.
    pub fn is_closed(&self) -> bool {
        self.close_reason.get().is_some() || self.cancel.is_cancelled()
    }

    /// Resolves once the subscriber has been unregistered.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Records the close reason. The first reason wins.
    pub(crate) fn mark(&self, reason: CloseReason) -> bool {
        self.close_reason.set(reason).is_ok()
    }

    /// Records the reason (first wins) and wakes both pumps.
    pub(crate) fn close(&self, reason: CloseReason) {
        self.mark(reason);
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.cancel.cancel();
    }

    /// Takes the producer half for the hub.
    pub(crate) fn take_sender(&self) -> Option<mpsc::Sender<QueuedMessage>> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// Consumer half of a subscriber queue, owned by the write pump.
pub struct SubscriberQueue {
    subscriber: Arc<Subscriber>,
    rx: mpsc::Receiver<QueuedMessage>,
    cancel: CancellationToken,
}

impl fmt::Debug for SubscriberQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberQueue")
            .field("subscriber", &self.subscriber.id)
            .field("len", &self.rx.len())
            .finish()
    }
}

impl SubscriberQueue {
    /// Subscriber this queue belongs to.
    pub fn subscriber(&self) -> &Arc<Subscriber> {
        &self.subscriber
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the subscriber is closed, even if items remain
    /// queued.
    pub async fn recv(&mut self) -> Option<QueuedMessage> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            msg = self.rx.recv() => msg,
        }
    }

    /// Next queued message without waiting, ignoring the close signal.
    pub fn try_recv(&mut self) -> Option<QueuedMessage> {
        self.rx.try_recv().ok()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Closes the queue and discards what is left. Returns the discarded count.
    pub fn drain(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}
