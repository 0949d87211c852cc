//! Trailing-edge coalescing of `presence.updated` snapshots.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RealtimeError;
use crate::hub::Hub;
use crate::message::{EventPayload, PresenceSnapshotPayload};
use crate::topic::catalogue::PRESENCE_UPDATED;

/// Collapses bursts of snapshots into at most one broadcast per window.
///
/// The first submission after a quiet period arms the window; when it
/// closes, the latest submitted snapshot is published.
#[derive(Debug)]
pub struct SnapshotCoalescer {
    window: Duration,
    tx: watch::Sender<PresenceSnapshotPayload>,
    rx: Mutex<Option<watch::Receiver<PresenceSnapshotPayload>>>,
}

impl SnapshotCoalescer {
    /// Creates a coalescer with the given window.
    pub fn new(window: Duration) -> Self {
        let (tx, rx) = watch::channel(PresenceSnapshotPayload::default());
        Self {
            window,
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Coalescing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replaces the pending snapshot.
    pub fn submit(&self, users: Vec<String>) {
        self.tx.send_replace(PresenceSnapshotPayload::new(users));
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> PresenceSnapshotPayload {
        self.tx.borrow().clone()
    }

    /// Publishes coalesced snapshots until `shutdown` fires.
    pub async fn run(&self, hub: &Hub, shutdown: CancellationToken) {
        let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(mut rx) = rx else {
            warn!("Snapshot coalescer already running");
            return;
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.window) => {}
            }

            let snapshot = rx.borrow_and_update().clone();
            let count = snapshot.count;
            match hub.publish_event(PRESENCE_UPDATED, None, EventPayload::PresenceSnapshot(snapshot)) {
                Ok(outcome) => debug!(
                    count,
                    delivered = outcome.delivered,
                    dropped = outcome.dropped,
                    "Presence snapshot published"
                ),
                Err(RealtimeError::ShuttingDown) => break,
                Err(e) => warn!(error = %e, "Failed to publish presence snapshot"),
            }
        }
        debug!("Snapshot coalescer stopped");
    }
}
