//! Hub counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters updated by the hub and the client sessions.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Messages accepted by `publish`
    pub published: AtomicU64,
    /// Successful enqueues
    pub delivered: AtomicU64,
    /// Enqueues refused because a queue was full or closed
    pub dropped: AtomicU64,
    /// Subscribers evicted as slow consumers
    pub evicted: AtomicU64,
    /// Successful registrations
    pub registered: AtomicU64,
    /// Subscribers removed for any reason
    pub unregistered: AtomicU64,
    /// Queued items discarded when a write pump exited
    pub discarded: AtomicU64,
    /// Frames written to sockets
    pub frames_written: AtomicU64,
}

impl HubMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_publish(&self, delivered: usize, dropped: usize) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unregistered(&self) {
        self.unregistered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            unregistered: self.unregistered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Messages accepted by `publish`
    pub published: u64,
    /// Successful enqueues
    pub delivered: u64,
    /// Refused enqueues
    pub dropped: u64,
    /// Slow-consumer evictions
    pub evicted: u64,
    /// Registrations
    pub registered: u64,
    /// Removals
    pub unregistered: u64,
    /// Items discarded on pump exit
    pub discarded: u64,
    /// Frames written to sockets
    pub frames_written: u64,
}
