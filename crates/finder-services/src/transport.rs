//! Transport seam between the overlay logic and the network.
//!
//! A `NeighborTransport` opens a channel to one neighbor's endpoint; the
//! channel delivers queries and replies stamped with the sender's id. The
//! daemon supplies an HTTP implementation, tests supply in-process ones.

use async_trait::async_trait;

use finder_core::{NodeId, QueryMessage, ReplyMessage};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("send to {endpoint} failed: {reason}")]
    SendFailed { endpoint: String, reason: String },

    #[error("{endpoint} rejected message with status {status}")]
    Rejected { endpoint: String, status: u16 },

    #[error("channel closed")]
    Closed,
}

/// Opens channels to neighbor endpoints.
#[async_trait]
pub trait NeighborTransport: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn NeighborChannel>, TransportError>;
}

/// An open channel to one neighbor.
#[async_trait]
pub trait NeighborChannel: Send {
    async fn send_query(&mut self, from: &NodeId, query: &QueryMessage) -> Result<(), TransportError>;

    async fn send_reply(&mut self, from: &NodeId, reply: &ReplyMessage) -> Result<(), TransportError>;

    async fn close(&mut self) {}
}
