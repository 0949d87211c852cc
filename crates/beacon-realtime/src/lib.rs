//! # beacon-realtime
//!
//! Real-time core for Beacon. Provides:
//!
//! - A sealed catalogue of broadcast and direct topics
//! - An in-process hub with bounded per-subscriber queues and slow-consumer eviction
//! - WebSocket client sessions (read and write pumps) over any `Sink`/`Stream`
//! - Heartbeat-driven presence with a background sweeper and coalesced snapshots

pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod server;
pub mod topic;

pub use error::RealtimeError;
pub use hub::{Hub, PublishOutcome, Subscriber, SubscriberFilter};
pub use message::Message;
pub use presence::PresenceService;
pub use server::RealtimeEngine;
pub use topic::TopicRegistry;
