//! finder-core — overlay value types, wire envelopes, and configuration.
//! All other finder crates depend on this one.

pub mod config;
pub mod message;
pub mod resource;

pub use message::{
    MessageId, NodeId, OverlayMessage, QueryEnvelope, QueryMessage, ReplyEnvelope, ReplyMessage,
};
pub use resource::{ResourceDescriptor, SearchCriteria};
