//! Subscriber management and fan-out.

pub mod filter;
pub mod hub;
pub mod subscriber;

pub use filter::SubscriberFilter;
pub use hub::{Hub, PublishOutcome};
pub use subscriber::{CloseReason, DEFAULT_QUEUE_CAPACITY, Subscriber, SubscriberId, SubscriberQueue};
