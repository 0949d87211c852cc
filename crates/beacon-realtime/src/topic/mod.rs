//! Topic catalogue: descriptors, validation, and the registry.

pub mod catalogue;
pub mod descriptor;
pub mod registry;

pub use descriptor::{PayloadShape, RECIPIENT_PLACEHOLDER, TopicDescriptor, TopicKind};
pub use registry::TopicRegistry;
