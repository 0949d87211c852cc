//! Hub messages, typed event payloads, and inbound socket commands.

pub mod envelope;
pub mod payload;
pub mod types;

pub use envelope::Message;
pub use payload::{EventPayload, PresenceSnapshotPayload, PresenceUserPayload};
pub use types::InboundMessage;
