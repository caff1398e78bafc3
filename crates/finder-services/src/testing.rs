//! In-process transport for unit tests: records every delivery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use finder_core::config::NeighborConfig;
use finder_core::{NodeId, OverlayMessage, QueryMessage, ReplyMessage};

use crate::neighbor::NeighborhoodManager;
use crate::transport::{NeighborChannel, NeighborTransport, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub endpoint: String,
    pub from: NodeId,
    pub msg: OverlayMessage,
}

#[derive(Clone, Default)]
pub struct CaptureTransport {
    log: Arc<Mutex<Vec<Delivery>>>,
}

impl CaptureTransport {
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// Messages delivered to neighbor `id` (endpoint `http://{id}`).
    pub fn sent_to(&self, id: &str) -> Vec<OverlayMessage> {
        let endpoint = format!("http://{id}");
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.endpoint == endpoint)
            .map(|d| d.msg.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

struct CaptureChannel {
    endpoint: String,
    log: Arc<Mutex<Vec<Delivery>>>,
}

#[async_trait]
impl NeighborTransport for CaptureTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn NeighborChannel>, TransportError> {
        Ok(Box::new(CaptureChannel {
            endpoint: endpoint.to_string(),
            log: self.log.clone(),
        }))
    }
}

#[async_trait]
impl NeighborChannel for CaptureChannel {
    async fn send_query(&mut self, from: &NodeId, query: &QueryMessage) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(Delivery {
            endpoint: self.endpoint.clone(),
            from: from.clone(),
            msg: query.clone().into(),
        });
        Ok(())
    }

    async fn send_reply(&mut self, from: &NodeId, reply: &ReplyMessage) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(Delivery {
            endpoint: self.endpoint.clone(),
            from: from.clone(),
            msg: reply.clone().into(),
        });
        Ok(())
    }
}

/// Started manager for node `local` with neighbors `http://{id}`.
pub fn neighborhood(local: &str, ids: &[&str], transport: &CaptureTransport) -> Arc<NeighborhoodManager> {
    let neighbors: Vec<_> = ids
        .iter()
        .map(|id| NeighborConfig {
            id: id.to_string(),
            endpoint: format!("http://{id}"),
        })
        .collect();
    let mgr = NeighborhoodManager::new(NodeId::from(local), &neighbors, 16, Arc::new(transport.clone()));
    mgr.start();
    Arc::new(mgr)
}

/// Let spawned tasks and delivery workers drain.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
