//! WebSocket client adapter: binds one socket to one subscriber.

pub mod frame;
pub mod inbound;
pub mod session;

pub use frame::{InboundFrame, NORMAL_CLOSURE, OutboundFrame};
pub use inbound::{IgnoreInbound, InboundHandler, PresenceInbound};
pub use session::{ClientSession, SessionConfig, SessionSummary};
