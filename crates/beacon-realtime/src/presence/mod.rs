//! Heartbeat-driven presence tracking.

pub mod coalesce;
pub mod record;
pub mod service;

pub use coalesce::SnapshotCoalescer;
pub use record::{Heartbeat, PresenceRecord, UNKNOWN_CLIENT_TYPE};
pub use service::PresenceService;
