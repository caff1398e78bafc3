//! Communication handler — the query/reply state machine.
//!
//! Inbound queries are forwarded (at most once per message id, never back to
//! the sender) and answered from the local resource cache. Inbound replies
//! retrace the query path using the forwarding table until their TTL runs
//! out at the node that originated the search, where the endpoints are
//! merged into the search cache.
//!
//! Entry points never block the caller: the work runs on spawned tasks,
//! bounded by an in-flight limit. Work arriving over the limit is dropped.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};

use finder_core::config::ProtocolConfig;
use finder_core::{MessageId, NodeId, OverlayMessage, QueryMessage, ReplyMessage, SearchCriteria};

use crate::forwarding::{ForwardingTable, Origin};
use crate::neighbor::NeighborhoodManager;
use crate::periodic::{run_periodic, FirstRun};
use crate::resource_cache::ResourceCache;
use crate::search::SearchCache;

/// What happened to a received query on the forwarding side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryForward {
    /// Forwarded with the updated TTL; carries the number of queues that accepted it.
    Forwarded(usize),
    /// Already seen; not forwarded again.
    Duplicate,
    /// Hop limit reached here, first sighting.
    Expired,
    /// Hop limit reached here for a message seen before.
    ExpiredDuplicate,
    /// TTL was already zero on arrival.
    Dropped,
}

/// What happened to a received reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyForward {
    /// Passed one hop back toward the originator.
    Forwarded(NodeId),
    /// No forwarding entry (expired or never seen), or the next queue refused it.
    Unroutable,
    /// Reached the originator and merged into the search cache.
    Delivered,
    /// Reached the originator after its search expired.
    Late,
    /// TTL was already zero on arrival.
    Dropped,
}

#[derive(Clone)]
pub struct CommunicationHandler {
    forwarding: ForwardingTable,
    searches: SearchCache,
    resources: ResourceCache,
    neighbors: Arc<NeighborhoodManager>,
    initial_ttl: u8,
    processing_delay: Duration,
    in_flight: Arc<Semaphore>,
}

impl CommunicationHandler {
    pub fn new(
        protocol: &ProtocolConfig,
        searches: SearchCache,
        resources: ResourceCache,
        neighbors: Arc<NeighborhoodManager>,
    ) -> Self {
        Self {
            forwarding: ForwardingTable::new(protocol.forwarding_entry_expiry()),
            searches,
            resources,
            neighbors,
            initial_ttl: protocol.initial_ttl,
            processing_delay: protocol.processing_delay(),
            in_flight: Arc::new(Semaphore::new(protocol.max_in_flight)),
        }
    }

    pub fn forwarding(&self) -> &ForwardingTable {
        &self.forwarding
    }

    pub fn searches(&self) -> &SearchCache {
        &self.searches
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    pub fn neighbors(&self) -> &Arc<NeighborhoodManager> {
        &self.neighbors
    }

    /// Originate a flood for `criteria`. Returns false, sending nothing, if
    /// the fresh message id collides with a live forwarding entry.
    pub fn create_new_search(&self, criteria: &SearchCriteria) -> bool {
        let msg_id = MessageId::generate();
        if !self.forwarding.add(msg_id, Origin::Local(criteria.clone())) {
            tracing::warn!(%msg_id, "generated message id already in forwarding table");
            return false;
        }

        let query = QueryMessage::originate(msg_id, self.initial_ttl, criteria.clone());
        let accepted = self.neighbors.broadcast(&OverlayMessage::Query(query), None);
        tracing::info!(%msg_id, %criteria, ttl = self.initial_ttl, neighbors = accepted, "search flooded");
        true
    }

    /// Forward and answer a query from `from`, in the background.
    pub fn handle_received_query(&self, from: NodeId, query: QueryMessage) {
        if query.time_to_live == 0 {
            tracing::debug!(msg_id = %query.msg_id, %from, "query arrived with ttl 0, dropped");
            return;
        }

        let h = self.clone();
        let (f, q) = (from.clone(), query.clone());
        self.dispatch("forward query", query.msg_id, async move {
            h.forward_query(&f, &q).await;
        });

        let h = self.clone();
        let msg_id = query.msg_id;
        self.dispatch("answer query", msg_id, async move {
            h.answer_query(&from, &query).await;
        });
    }

    /// Route a reply one hop back, or deliver it here, in the background.
    pub fn handle_received_reply(&self, from: NodeId, reply: ReplyMessage) {
        if reply.time_to_live == 0 {
            tracing::debug!(msg_id = %reply.msg_id, %from, "reply arrived with ttl 0, dropped");
            return;
        }

        let h = self.clone();
        let msg_id = reply.msg_id;
        self.dispatch("forward reply", msg_id, async move {
            h.forward_reply(&reply).await;
        });
    }

    /// Forwarding half of query handling.
    pub async fn forward_query(&self, from: &NodeId, query: &QueryMessage) -> QueryForward {
        if query.time_to_live == 0 {
            return QueryForward::Dropped;
        }
        let next = query.next_hop();

        if next.time_to_live > 0 {
            if !self.forwarding.add(next.msg_id, Origin::Neighbor(from.clone())) {
                tracing::debug!(msg_id = %next.msg_id, %from, "duplicate query suppressed");
                return QueryForward::Duplicate;
            }
            let accepted = self
                .neighbors
                .broadcast(&OverlayMessage::Query(next.clone()), Some(from));
            tracing::debug!(
                msg_id = %next.msg_id,
                %from,
                ttl = next.time_to_live,
                hops = next.hops_count,
                neighbors = accepted,
                "query forwarded"
            );
            QueryForward::Forwarded(accepted)
        } else if self.forwarding.contains_entry(&next.msg_id) {
            tracing::debug!(msg_id = %next.msg_id, %from, "duplicate query reached hop limit");
            QueryForward::ExpiredDuplicate
        } else {
            tracing::debug!(msg_id = %next.msg_id, %from, "query reached hop limit");
            QueryForward::Expired
        }
    }

    /// Answering half of query handling. Runs for every received query,
    /// duplicates included. Returns the reply if one was sent.
    pub async fn answer_query(&self, from: &NodeId, query: &QueryMessage) -> Option<ReplyMessage> {
        let here = query.next_hop();
        let found: BTreeSet<String> = self
            .resources
            .find_matching(&here.criteria)
            .into_iter()
            .collect();
        tracing::debug!(msg_id = %here.msg_id, criteria = %here.criteria, found = found.len(), "query processed");
        if found.is_empty() {
            return None;
        }

        let reply = ReplyMessage::answer(&here, found);
        if !self
            .neighbors
            .send_to(OverlayMessage::Reply(reply.clone()), from)
        {
            tracing::warn!(msg_id = %reply.msg_id, %from, "reply could not be queued");
        }
        Some(reply)
    }

    /// Reply routing.
    pub async fn forward_reply(&self, reply: &ReplyMessage) -> ReplyForward {
        if reply.time_to_live == 0 {
            return ReplyForward::Dropped;
        }
        let next = reply.next_hop();

        if next.time_to_live > 0 {
            let Some(Origin::Neighbor(target)) = self.forwarding.lookup(&next.msg_id) else {
                tracing::debug!(msg_id = %next.msg_id, "no route for reply, dropped");
                return ReplyForward::Unroutable;
            };
            if !self
                .neighbors
                .send_to(OverlayMessage::Reply(next.clone()), &target)
            {
                return ReplyForward::Unroutable;
            }
            tracing::debug!(msg_id = %next.msg_id, to = %target, found = next.found_endpoints.len(), "reply forwarded");
            return ReplyForward::Forwarded(target);
        }

        let Some(Origin::Local(criteria)) = self.forwarding.lookup(&next.msg_id) else {
            tracing::debug!(msg_id = %next.msg_id, "reply reached hop limit without a local search");
            return ReplyForward::Unroutable;
        };
        if self
            .searches
            .update_result(&criteria, next.found_endpoints.iter().cloned())
        {
            tracing::info!(msg_id = %next.msg_id, %criteria, found = next.found_endpoints.len(), "search results updated");
            ReplyForward::Delivered
        } else {
            tracing::debug!(msg_id = %next.msg_id, %criteria, "reply arrived after search expired");
            ReplyForward::Late
        }
    }

    /// Purge forwarding entries that came from `neighbor`.
    pub fn clean_neighbor(&self, neighbor: &NodeId) -> usize {
        self.forwarding.clean_neighbor(neighbor)
    }

    /// Sweep expired forwarding entries every `period` until shutdown.
    pub async fn run_forwarding_sweeper(self, period: Duration, shutdown: broadcast::Receiver<()>) {
        let table = self.forwarding.clone();
        run_periodic("forwarding-sweep", period, FirstRun::AfterPeriod, shutdown, move || {
            let table = table.clone();
            async move {
                let removed = table.clean();
                tracing::debug!(removed, remaining = table.len(), "forwarding table swept");
            }
        })
        .await;
    }

    fn dispatch<F>(&self, what: &'static str, msg_id: MessageId, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(permit) = self.in_flight.clone().try_acquire_owned() else {
            tracing::warn!(%msg_id, work = what, "too much inbound work in flight, dropped");
            return;
        };
        let delay = self.processing_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            work.await;
            drop(permit);
        });
    }
}
