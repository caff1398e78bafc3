//! Finder integration test harness.
//!
//! Builds small overlays of in-process nodes. Each node has the full
//! protocol stack; only the wire is replaced by a loopback transport that
//! hands messages straight to the receiving node's inbound service.
//!
//!   cargo test --test integration

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use finder_core::config::{NeighborConfig, ProtocolConfig};
use finder_core::{NodeId, QueryMessage, ReplyMessage, ResourceDescriptor, SearchCriteria};
use finder_services::{
    CommunicationHandler, NeighborChannel, NeighborTransport, NeighborhoodManager,
    ProcessingServiceFinder, QueryReplyService, ResourceCache, SearchCache, TransportError,
};

mod flood;
mod resources;
mod routing;

// ── Harness ───────────────────────────────────────────────────────────────────

/// One recorded hop.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub from: String,
    pub to: String,
    pub kind: &'static str,
}

type Registry = Arc<RwLock<HashMap<String, QueryReplyService>>>;

/// Delivers to the in-process node registered under the endpoint.
#[derive(Clone)]
pub struct LoopbackTransport {
    registry: Registry,
    hops: Arc<Mutex<Vec<Hop>>>,
}

struct LoopbackChannel {
    endpoint: String,
    service: QueryReplyService,
    hops: Arc<Mutex<Vec<Hop>>>,
}

#[async_trait]
impl NeighborTransport for LoopbackTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn NeighborChannel>, TransportError> {
        let service = self.registry.read().unwrap().get(endpoint).cloned();
        match service {
            Some(service) => Ok(Box::new(LoopbackChannel {
                endpoint: endpoint.to_string(),
                service,
                hops: self.hops.clone(),
            })),
            None => Err(TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: "no such node".into(),
            }),
        }
    }
}

impl LoopbackChannel {
    fn record(&self, from: &NodeId, kind: &'static str, accepted: bool) -> Result<(), TransportError> {
        if !accepted {
            return Err(TransportError::Rejected {
                endpoint: self.endpoint.clone(),
                status: 403,
            });
        }
        self.hops.lock().unwrap().push(Hop {
            from: from.to_string(),
            to: node_of(&self.endpoint).to_string(),
            kind,
        });
        Ok(())
    }
}

#[async_trait]
impl NeighborChannel for LoopbackChannel {
    async fn send_query(&mut self, from: &NodeId, query: &QueryMessage) -> Result<(), TransportError> {
        let accepted = self.service.query(from.clone(), query.clone());
        self.record(from, "query", accepted)
    }

    async fn send_reply(&mut self, from: &NodeId, reply: &ReplyMessage) -> Result<(), TransportError> {
        let accepted = self.service.reply(from.clone(), reply.clone());
        self.record(from, "reply", accepted)
    }
}

pub fn endpoint_of(id: &str) -> String {
    format!("mem://{id}")
}

fn node_of(endpoint: &str) -> &str {
    endpoint.trim_start_matches("mem://")
}

pub struct Node {
    pub id: NodeId,
    pub handler: CommunicationHandler,
    pub finder: ProcessingServiceFinder,
    pub gateway: QueryReplyService,
}

impl Node {
    /// Make this node's resource cache advertise `resource` at `endpoint`.
    pub fn offer(&self, endpoint: &str, resource: ResourceDescriptor) {
        self.handler
            .resources()
            .update_on_detection(endpoint, [resource], 0);
    }

    pub fn found(&self, criteria: &SearchCriteria) -> Vec<String> {
        self.handler
            .searches()
            .try_get_result_copy(criteria)
            .map(|r| r.into_endpoints().into_iter().collect())
            .unwrap_or_default()
    }
}

pub struct Overlay {
    nodes: HashMap<String, Node>,
    hops: Arc<Mutex<Vec<Hop>>>,
}

impl Overlay {
    /// Nodes joined by undirected `edges`, all with the same protocol settings.
    pub fn build(edges: &[(&str, &str)], protocol: ProtocolConfig) -> Self {
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for (a, b) in edges {
            adjacency.entry(a.to_string()).or_default().push(b.to_string());
            adjacency.entry(b.to_string()).or_default().push(a.to_string());
        }

        let registry: Registry = Arc::new(RwLock::new(HashMap::new()));
        let hops = Arc::new(Mutex::new(Vec::new()));
        let transport = LoopbackTransport {
            registry: registry.clone(),
            hops: hops.clone(),
        };

        let mut nodes = HashMap::new();
        for (id, neighbor_ids) in adjacency {
            let neighbors: Vec<_> = neighbor_ids
                .iter()
                .map(|n| NeighborConfig {
                    id: n.clone(),
                    endpoint: endpoint_of(n),
                })
                .collect();
            let manager = NeighborhoodManager::new(
                NodeId::new(id.clone()),
                &neighbors,
                protocol.output_queue_capacity,
                Arc::new(transport.clone()),
            );
            let handler = CommunicationHandler::new(
                &protocol,
                SearchCache::new(protocol.search_expiry()),
                ResourceCache::new(),
                Arc::new(manager),
            );
            let gateway = QueryReplyService::new(handler.clone());
            registry
                .write()
                .unwrap()
                .insert(endpoint_of(&id), gateway.clone());
            nodes.insert(
                id.clone(),
                Node {
                    id: NodeId::new(id),
                    finder: ProcessingServiceFinder::new(handler.clone()),
                    gateway,
                    handler,
                },
            );
        }

        for node in nodes.values() {
            node.handler.neighbors().start();
        }
        Self { nodes, hops }
    }

    pub fn node(&self, id: &str) -> &Node {
        &self.nodes[id]
    }

    pub fn hops(&self) -> Vec<Hop> {
        self.hops.lock().unwrap().clone()
    }

    pub fn hops_of(&self, kind: &str) -> usize {
        self.hops().iter().filter(|h| h.kind == kind).count()
    }

    pub fn received(&self, node: &str, kind: &str) -> usize {
        self.hops()
            .iter()
            .filter(|h| h.to == node && h.kind == kind)
            .count()
    }

    /// Wait until no hop has been recorded for a while.
    pub async fn quiesce(&self) {
        let mut last = usize::MAX;
        loop {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let now = self.hops.lock().unwrap().len();
            if now == last {
                return;
            }
            last = now;
        }
    }

    pub async fn shutdown(&self) {
        for node in self.nodes.values() {
            node.handler.neighbors().shutdown(Duration::from_secs(1)).await;
        }
    }
}

pub fn protocol(initial_ttl: u8) -> ProtocolConfig {
    ProtocolConfig {
        initial_ttl,
        ..ProtocolConfig::default()
    }
}

pub fn x10() -> SearchCriteria {
    SearchCriteria::new("X", "1.0")
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn eventually<F: FnMut() -> bool>(timeout: Duration, mut cond: F) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    if cond() {
        return Ok(());
    }
    bail!("condition not met within {timeout:?}")
}
