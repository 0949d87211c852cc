//! Top-level real-time engine that wires the registry, hub, and presence.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

use beacon_core::config::RealtimeConfig;

use crate::connection::SessionConfig;
use crate::error::RealtimeError;
use crate::hub::{Hub, Subscriber, SubscriberFilter, SubscriberQueue};
use crate::metrics::HubMetrics;
use crate::presence::PresenceService;
use crate::topic::{TopicRegistry, catalogue};

/// Central real-time engine.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Sealed topic catalogue.
    pub registry: Arc<TopicRegistry>,
    /// Fan-out hub.
    pub hub: Arc<Hub>,
    /// Presence service.
    pub presence: Arc<PresenceService>,
    /// Hub counters.
    pub metrics: Arc<HubMetrics>,
    config: RealtimeConfig,
    shutdown: CancellationToken,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    sessions: TaskTracker,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("topics", &self.registry.len())
            .field("subscribers", &self.hub.subscriber_count())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl RealtimeEngine {
    /// Registers the standard catalogue, seals it, and builds the hub and
    /// presence service. Background tasks start with [`start`](Self::start).
    pub fn new(config: RealtimeConfig) -> Result<Self, RealtimeError> {
        let registry = Arc::new(TopicRegistry::new());
        catalogue::register_standard(&registry)?;
        registry.seal();

        let metrics = Arc::new(HubMetrics::new());
        let hub = Arc::new(Hub::new(registry.clone(), metrics.clone()));
        let presence = Arc::new(PresenceService::new(hub.clone(), config.presence.clone()));

        info!(
            topics = registry.len(),
            subscriber_queue = config.subscriber_queue,
            "Real-time engine initialized"
        );

        Ok(Self {
            registry,
            hub,
            presence,
            metrics,
            config,
            shutdown: CancellationToken::new(),
            tasks: Arc::new(Mutex::new(Vec::new())),
            sessions: TaskTracker::new(),
        })
    }

    /// Spawns the hub control task, presence sweeper, and snapshot coalescer.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            warn!("Real-time engine already started");
            return;
        }
        tasks.push(tokio::spawn(self.hub.clone().run_control(self.shutdown.clone())));
        tasks.extend(self.presence.spawn(self.shutdown.clone()));
        info!(tasks = tasks.len(), "Real-time engine started");
    }

    /// Engine settings.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Pump timeouts derived from the settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from(&self.config)
    }

    /// A new, unregistered subscriber with the configured queue capacity.
    pub fn subscriber(
        &self,
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        filter: SubscriberFilter,
    ) -> (Arc<Subscriber>, SubscriberQueue) {
        Subscriber::new(user_id, client_id, filter, self.config.subscriber_queue)
    }

    /// Wraps a client session so [`shutdown`](Self::shutdown) waits for it.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Client sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Process-wide cancellation token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops background tasks, closes every subscriber, and waits up to the
    /// drain grace for client sessions to flush and close.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.shutdown.cancel();
        let closed = self.hub.shutdown();

        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task failed");
            }
        }

        self.sessions.close();
        let grace = Duration::from_millis(self.config.shutdown_drain_ms);
        if tokio::time::timeout(grace, self.sessions.wait()).await.is_err() {
            warn!(
                remaining = self.sessions.len(),
                grace_ms = self.config.shutdown_drain_ms,
                "Client sessions still running after drain grace"
            );
        }
        info!(closed, "Real-time engine shut down");
    }
}
