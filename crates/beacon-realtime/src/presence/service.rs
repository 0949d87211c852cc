//! (user, client) liveness and online/offline transitions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::config::PresenceConfig;

use crate::error::RealtimeError;
use crate::hub::Hub;
use crate::message::{EventPayload, PresenceUserPayload};
use crate::topic::catalogue::{PRESENCE_USER_OFFLINE, PRESENCE_USER_ONLINE};

use super::coalesce::SnapshotCoalescer;
use super::record::{Heartbeat, PresenceRecord, validate};

#[derive(Debug, Default)]
struct PresenceState {
    /// user → client → record
    clients: HashMap<String, HashMap<String, PresenceRecord>>,
    /// Users for which `presence.user.online` was emitted and no offline yet.
    online: HashSet<String>,
}

impl PresenceState {
    fn is_live(&self, user_id: &str, now: Instant) -> bool {
        self.clients
            .get(user_id)
            .is_some_and(|records| records.values().any(|r| r.is_live_at(now)))
    }

    fn live_users(&self, now: Instant) -> Vec<String> {
        let mut users: Vec<String> = self
            .clients
            .iter()
            .filter(|(_, records)| records.values().any(|r| r.is_live_at(now)))
            .map(|(user, _)| user.clone())
            .collect();
        users.sort();
        users
    }
}

/// Tracks liveness per (user, client) and publishes presence events.
#[derive(Debug)]
pub struct PresenceService {
    hub: Arc<Hub>,
    config: PresenceConfig,
    state: Mutex<PresenceState>,
    coalescer: SnapshotCoalescer,
}

impl PresenceService {
    /// Creates a service publishing through `hub`.
    pub fn new(hub: Arc<Hub>, config: PresenceConfig) -> Self {
        let coalescer =
            SnapshotCoalescer::new(Duration::from_millis(config.snapshot_coalesce_ms));
        Self {
            hub,
            config,
            state: Mutex::new(PresenceState::default()),
            coalescer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PresenceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Settings in effect.
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Records a heartbeat.
    ///
    /// Emits `presence.user.online` when the user was not online and always
    /// schedules a `presence.updated` snapshot.
    pub fn heartbeat(&self, heartbeat: Heartbeat) -> Result<PresenceRecord, RealtimeError> {
        let hb = validate(
            heartbeat,
            self.config.default_ping_interval_ms,
            self.config.default_timeout_multiplier,
        )?;
        let now = Instant::now();
        let record = PresenceRecord::new(
            hb.user_id,
            hb.client_id,
            hb.client_type,
            hb.ping_interval_ms,
            hb.timeout_multiplier,
            now,
        );

        let mut state = self.lock();
        state
            .clients
            .entry(record.user_id.clone())
            .or_default()
            .insert(record.client_id.clone(), record.clone());

        // A user whose records lapsed but who has not been swept yet is still
        // announced, so a heartbeat in that gap emits no second online event.
        if state.online.insert(record.user_id.clone()) {
            info!(
                user_id = %record.user_id,
                client_id = %record.client_id,
                client_type = %record.client_type,
                "User online"
            );
            self.emit(PRESENCE_USER_ONLINE, &record.user_id);
        } else {
            debug!(
                user_id = %record.user_id,
                client_id = %record.client_id,
                "Heartbeat"
            );
        }

        // Submitted under the lock so snapshots reach the coalescer in the
        // order they were taken.
        self.coalescer.submit(state.live_users(now));
        Ok(record)
    }

    /// Removes the record for (user, client).
    ///
    /// Emits `presence.user.offline` when no live record remains for the
    /// user. Returns whether a record was removed.
    pub fn offline(&self, user_id: &str, client_id: &str) -> Result<bool, RealtimeError> {
        if user_id.trim().is_empty() {
            return Err(RealtimeError::BadHeartbeat("user_id is required"));
        }
        if client_id.trim().is_empty() {
            return Err(RealtimeError::BadHeartbeat("client_id is required"));
        }
        let (user_id, client_id) = (user_id.trim(), client_id.trim());
        let now = Instant::now();

        let mut state = self.lock();
        let removed = match state.clients.get_mut(user_id) {
            Some(records) => {
                let removed = records.remove(client_id).is_some();
                records.retain(|_, r| r.is_live_at(now));
                if records.is_empty() {
                    state.clients.remove(user_id);
                }
                removed
            }
            None => false,
        };

        let went_offline = !state.is_live(user_id, now) && state.online.remove(user_id);
        if went_offline {
            info!(user_id = %user_id, client_id = %client_id, "User offline");
            self.emit(PRESENCE_USER_OFFLINE, user_id);
        }

        if removed || went_offline {
            self.coalescer.submit(state.live_users(now));
        }
        Ok(removed)
    }

    /// Sorted ids of users with at least one live record.
    pub fn get_online_users(&self) -> Vec<String> {
        self.lock().live_users(Instant::now())
    }

    /// Number of online users.
    pub fn online_count(&self) -> usize {
        self.get_online_users().len()
    }

    /// Most recently seen live record of `user_id`.
    pub fn get_presence(&self, user_id: &str) -> Option<PresenceRecord> {
        let now = Instant::now();
        self.lock().clients.get(user_id).and_then(|records| {
            records
                .values()
                .filter(|r| r.is_live_at(now))
                .max_by_key(|r| r.seen_at)
                .cloned()
        })
    }

    /// Removes expired records and emits offline events for users left with
    /// none. Returns those users, sorted.
    pub fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut state = self.lock();

        let mut expired = 0;
        for (user_id, records) in state.clients.iter_mut() {
            records.retain(|client_id, r| {
                let live = r.is_live_at(now);
                if !live {
                    expired += 1;
                    debug!(user_id = %user_id, client_id = %client_id, "Presence record expired");
                }
                live
            });
        }
        state.clients.retain(|_, records| !records.is_empty());

        let mut gone: Vec<String> = state
            .online
            .iter()
            .filter(|user| !state.clients.contains_key(*user))
            .cloned()
            .collect();
        gone.sort();

        for user_id in &gone {
            state.online.remove(user_id);
            info!(user_id = %user_id, "User offline (expired)");
            self.emit(PRESENCE_USER_OFFLINE, user_id);
        }

        if expired > 0 {
            debug!(expired, offline = gone.len(), "Presence sweep");
        }
        if !gone.is_empty() {
            self.coalescer.submit(state.live_users(now));
        }
        gone
    }

    fn emit(&self, topic: &str, user_id: &str) {
        let payload = EventPayload::PresenceUser(PresenceUserPayload {
            user_id: user_id.to_string(),
        });
        if let Err(e) = self.hub.publish_event(topic, None, payload) {
            warn!(topic = %topic, user_id = %user_id, error = %e, "Failed to publish presence event");
        }
    }

    /// Spawns the sweeper and the snapshot coalescer.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().run_sweeper(shutdown.clone())),
            tokio::spawn(self.clone().run_coalescer(shutdown)),
        ]
    }

    async fn run_sweeper(self: Arc<Self>, shutdown: CancellationToken) {
        let period = Duration::from_millis(self.config.sweep_interval_ms.max(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_ms = period.as_millis() as u64, "Presence sweeper started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let gone = self.sweep();
                    if !gone.is_empty() {
                        debug!(count = gone.len(), "Sweeper removed offline users");
                    }
                }
            }
        }
        debug!("Presence sweeper stopped");
    }

    async fn run_coalescer(self: Arc<Self>, shutdown: CancellationToken) {
        self.coalescer.run(&self.hub, shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Subscriber, SubscriberFilter, SubscriberQueue};
    use crate::metrics::HubMetrics;
    use crate::topic::TopicRegistry;
    use crate::topic::catalogue::{self, PRESENCE_TOPICS, PRESENCE_UPDATED};

    struct Harness {
        hub: Arc<Hub>,
        presence: Arc<PresenceService>,
        events: SubscriberQueue,
        shutdown: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(TopicRegistry::new());
            catalogue::register_standard(&registry).unwrap();
            registry.seal();
            let hub = Arc::new(Hub::new(registry, Arc::new(HubMetrics::new())));

            let (listener, events) =
                Subscriber::new("observer", "o1", SubscriberFilter::topics([PRESENCE_TOPICS]), 256);
            hub.register(&listener).unwrap();

            let presence = Arc::new(PresenceService::new(hub.clone(), PresenceConfig::default()));
            let shutdown = CancellationToken::new();
            presence.spawn(shutdown.clone());

            Self {
                hub,
                presence,
                events,
                shutdown,
            }
        }

        /// Topic and payload of everything published so far.
        fn drain(&mut self) -> Vec<(String, String)> {
            let mut out = Vec::new();
            while let Some(msg) = self.events.try_recv() {
                out.push((msg.topic.clone(), msg.payload_str().unwrap_or_default().to_string()));
            }
            out
        }

        fn count(events: &[(String, String)], topic: &str) -> usize {
            events.iter().filter(|(t, _)| t == topic).count()
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    fn hb(user: &str, client: &str, interval: i64, multiplier: i64) -> Heartbeat {
        Heartbeat::new(user, client).timing(interval, multiplier)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_with_sweeper_expiry() {
        let mut h = Harness::new();

        h.presence.heartbeat(hb("alice", "c1", 1000, 3)).unwrap();
        let events = h.drain();
        assert_eq!(events, vec![(
            PRESENCE_USER_ONLINE.to_string(),
            "{\"user_id\":\"alice\"}".to_string()
        )]);
        assert_eq!(h.presence.get_online_users(), vec!["alice"]);

        sleep_ms(1000).await;
        h.presence.heartbeat(hb("alice", "c2", 1000, 3)).unwrap();
        sleep_ms(300).await;
        let events = h.drain();
        assert_eq!(Harness::count(&events, PRESENCE_USER_ONLINE), 0);
        assert_eq!(Harness::count(&events, PRESENCE_UPDATED), 2);

        // Both records expire by t=4s; the sweeper runs at t=5s.
        sleep_ms(3800).await;
        let events = h.drain();
        assert_eq!(Harness::count(&events, PRESENCE_USER_OFFLINE), 1);
        assert!(h.presence.get_online_users().is_empty());
        assert!(h.presence.get_presence("alice").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_client_user_stays_online() {
        let mut h = Harness::new();
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        h.presence.heartbeat(hb("alice", "c2", 30_000, 3)).unwrap();

        assert!(h.presence.offline("alice", "c1").unwrap());
        assert_eq!(h.presence.get_online_users(), vec!["alice"]);
        assert_eq!(Harness::count(&h.drain(), PRESENCE_USER_OFFLINE), 0);

        assert!(h.presence.offline("alice", "c2").unwrap());
        let events = h.drain();
        assert_eq!(Harness::count(&events, PRESENCE_USER_OFFLINE), 1);
        assert!(h.presence.get_online_users().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_heartbeats_coalesce() {
        let mut h = Harness::new();
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        sleep_ms(50).await;
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        sleep_ms(300).await;

        let events = h.drain();
        let snapshots: Vec<&(String, String)> =
            events.iter().filter(|(t, _)| t == PRESENCE_UPDATED).collect();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].1, "{\"users\":[\"alice\"],\"count\":1}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_carries_latest_state() {
        let mut h = Harness::new();
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        h.presence.heartbeat(hb("bob", "c1", 30_000, 3)).unwrap();
        h.presence.heartbeat(hb("carol", "c1", 30_000, 3)).unwrap();
        sleep_ms(300).await;

        let events = h.drain();
        let snapshots: Vec<&(String, String)> =
            events.iter().filter(|(t, _)| t == PRESENCE_UPDATED).collect();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(
            snapshots[0].1,
            "{\"users\":[\"alice\",\"bob\",\"carol\"],\"count\":3}"
        );
        assert_eq!(Harness::count(&events, PRESENCE_USER_ONLINE), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_millisecond_expiry() {
        let mut h = Harness::new();
        h.presence.heartbeat(hb("alice", "c1", 1, 1)).unwrap();
        assert_eq!(h.presence.get_online_users(), vec!["alice"]);

        sleep_ms(2).await;
        assert!(h.presence.get_online_users().is_empty());
        assert_eq!(h.presence.sweep(), vec!["alice"]);
        assert_eq!(Harness::count(&h.drain(), PRESENCE_USER_OFFLINE), 1);
        assert!(h.presence.sweep().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_then_offline_leaves_no_trace() {
        let h = Harness::new();
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        h.presence.offline("alice", "c1").unwrap();

        assert!(h.presence.get_presence("alice").is_none());
        assert!(h.presence.get_online_users().is_empty());
        assert!(h.presence.lock().clients.is_empty());
        assert!(h.presence.lock().online.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_presence_returns_most_recent_client() {
        let h = Harness::new();
        h.presence
            .heartbeat(Heartbeat {
                client_type: Some("desktop".into()),
                ..hb("alice", "c1", 30_000, 3)
            })
            .unwrap();
        sleep_ms(10).await;
        h.presence
            .heartbeat(Heartbeat {
                client_type: Some("mobile".into()),
                ..hb("alice", "c2", 30_000, 3)
            })
            .unwrap();

        let record = h.presence.get_presence("alice").unwrap();
        assert_eq!(record.client_id, "c2");
        assert_eq!(record.client_type, "mobile");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_heartbeat_changes_nothing() {
        let mut h = Harness::new();
        let err = h.presence.heartbeat(hb("alice", "", 1000, 3)).unwrap_err();
        assert_eq!(err, RealtimeError::BadHeartbeat("client_id is required"));
        assert!(h.presence.get_online_users().is_empty());
        assert!(h.drain().is_empty());
        assert!(h.presence.offline("alice", "").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_keeps_state() {
        let h = Harness::new();
        h.hub.shutdown();
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        assert_eq!(h.presence.get_online_users(), vec!["alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_unknown_client_is_noop() {
        let mut h = Harness::new();
        assert!(!h.presence.offline("ghost", "c1").unwrap());
        sleep_ms(300).await;
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_concurrent_heartbeats_leave_latest_snapshot_pending() {
        const USERS: usize = 32;
        for _ in 0..100 {
            let registry = Arc::new(TopicRegistry::new());
            catalogue::register_standard(&registry).unwrap();
            registry.seal();
            let hub = Arc::new(Hub::new(registry, Arc::new(HubMetrics::new())));
            let presence = Arc::new(PresenceService::new(hub, PresenceConfig::default()));
            let barrier = Arc::new(std::sync::Barrier::new(USERS));

            let threads: Vec<_> = (0..USERS)
                .map(|i| {
                    let presence = presence.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        presence
                            .heartbeat(hb(&format!("user-{i:02}"), "c1", 30_000, 3))
                            .unwrap();
                    })
                })
                .collect();
            for t in threads {
                t.join().unwrap();
            }

            let pending = presence.coalescer.pending();
            assert_eq!(pending.count, USERS);
            assert_eq!(pending.users, presence.get_online_users());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_before_sweep_does_not_reannounce() {
        let mut h = Harness::new();
        h.presence.heartbeat(hb("alice", "c1", 10, 1)).unwrap();
        sleep_ms(300).await;
        h.drain();

        // Lapsed but not yet swept: absent from reads, still announced.
        assert!(h.presence.get_online_users().is_empty());
        h.presence.heartbeat(hb("alice", "c1", 30_000, 3)).unwrap();
        sleep_ms(300).await;

        let events = h.drain();
        assert_eq!(Harness::count(&events, PRESENCE_USER_OFFLINE), 0);
        assert_eq!(Harness::count(&events, PRESENCE_USER_ONLINE), 0);
        assert_eq!(
            events.last().map(|(t, p)| (t.as_str(), p.as_str())),
            Some((PRESENCE_UPDATED, "{\"users\":[\"alice\"],\"count\":1}"))
        );
    }
}
