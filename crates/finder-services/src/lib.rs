//! finder-services — the overlay protocol engine: forwarding table, search
//! and resource caches, neighbor delivery queues, and the query/reply
//! handler, plus the two inbound faces built on top of them.

pub mod finder;
pub mod forwarding;
pub mod gateway;
pub mod handler;
pub mod neighbor;
pub mod periodic;
pub mod poller;
pub mod resource_cache;
pub mod search;
pub mod transport;

#[cfg(test)]
mod testing;

pub use finder::ProcessingServiceFinder;
pub use forwarding::{ForwardingEntry, ForwardingTable, Origin};
pub use gateway::QueryReplyService;
pub use handler::{CommunicationHandler, QueryForward, ReplyForward};
pub use neighbor::{NeighborClient, NeighborStatus, NeighborhoodManager};
pub use poller::{Detection, PollOutcome, RefreshSummary, ResourceCacheUpdater, ResourceProbe};
pub use resource_cache::{now_ms, ResourceCache, ResourceEntry};
pub use search::{SearchCache, SearchResult, SearchStart};
pub use transport::{NeighborChannel, NeighborTransport, TransportError};
