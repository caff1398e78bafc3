//! HTTP API handlers — client search, neighbor message intake, and node
//! state as JSON.

pub mod overlay;
pub mod search;
pub mod status;

use finder_core::NodeId;
use finder_services::{CommunicationHandler, ProcessingServiceFinder, QueryReplyService};

#[derive(Clone)]
pub struct ApiState {
    pub node_id: NodeId,
    pub finder: ProcessingServiceFinder,
    pub gateway: QueryReplyService,
    /// Read access to the forwarding table, caches and neighbor queues.
    pub handler: CommunicationHandler,
    /// Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl ApiState {
    pub fn new(
        node_id: NodeId,
        handler: CommunicationHandler,
        shutdown_tx: tokio::sync::broadcast::Sender<()>,
    ) -> Self {
        Self {
            node_id,
            finder: ProcessingServiceFinder::new(handler.clone()),
            gateway: QueryReplyService::new(handler.clone()),
            handler,
            shutdown_tx,
        }
    }
}


pub use overlay::{handle_query, handle_reply};
pub use search::handle_search;
pub use status::{handle_neighbors, handle_resources, handle_shutdown, handle_status};
