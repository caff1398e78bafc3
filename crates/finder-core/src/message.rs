//! Overlay messages — flooded queries and reverse-path replies.
//!
//! A query is created once at the searching node with a fresh `MessageId`
//! and flooded, bounded by its TTL. A reply carries the id of the query it
//! answers and retraces the query's path hop by hop. Neither id is ever
//! regenerated in transit.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::SearchCriteria;

/// Identifier of an overlay node. Opaque and stable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 128-bit random message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A search request flooded through the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMessage {
    pub msg_id: MessageId,
    pub time_to_live: u8,
    pub hops_count: u8,
    pub criteria: SearchCriteria,
}

impl QueryMessage {
    /// A query as originated by the searching node: `hops_count` is 0.
    pub fn originate(msg_id: MessageId, time_to_live: u8, criteria: SearchCriteria) -> Self {
        Self {
            msg_id,
            time_to_live,
            hops_count: 0,
            criteria,
        }
    }

    /// Copy of this query after one hop: TTL decremented, hop count incremented.
    pub fn next_hop(&self) -> Self {
        Self {
            msg_id: self.msg_id,
            time_to_live: self.time_to_live.saturating_sub(1),
            hops_count: self.hops_count.saturating_add(1),
            criteria: self.criteria.clone(),
        }
    }
}

/// Endpoints that satisfy a query, travelling back toward the searcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub msg_id: MessageId,
    pub time_to_live: u8,
    pub hops_count: u8,
    pub found_endpoints: BTreeSet<String>,
}

impl ReplyMessage {
    /// Answer to `query` as seen at the answering node.
    ///
    /// The reply TTL is the query's hop count at this node, which is exactly
    /// the number of hops back to the originator.
    pub fn answer(query: &QueryMessage, found_endpoints: BTreeSet<String>) -> Self {
        Self {
            msg_id: query.msg_id,
            time_to_live: query.hops_count,
            hops_count: 0,
            found_endpoints,
        }
    }

    /// Copy of this reply after one hop.
    pub fn next_hop(&self) -> Self {
        Self {
            msg_id: self.msg_id,
            time_to_live: self.time_to_live.saturating_sub(1),
            hops_count: self.hops_count.saturating_add(1),
            found_endpoints: self.found_endpoints.clone(),
        }
    }
}

/// Either kind of overlay message, as queued for delivery to a neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayMessage {
    Query(QueryMessage),
    Reply(ReplyMessage),
}

impl OverlayMessage {
    pub fn msg_id(&self) -> MessageId {
        match self {
            OverlayMessage::Query(q) => q.msg_id,
            OverlayMessage::Reply(r) => r.msg_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OverlayMessage::Query(_) => "query",
            OverlayMessage::Reply(_) => "reply",
        }
    }
}

impl From<QueryMessage> for OverlayMessage {
    fn from(q: QueryMessage) -> Self {
        OverlayMessage::Query(q)
    }
}

impl From<ReplyMessage> for OverlayMessage {
    fn from(r: ReplyMessage) -> Self {
        OverlayMessage::Reply(r)
    }
}

// ── Wire envelopes ────────────────────────────────────────────────────────────

/// Body of a neighbor-to-neighbor query call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEnvelope {
    pub from: NodeId,
    pub query: QueryMessage,
}

/// Body of a neighbor-to-neighbor reply call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub from: NodeId,
    pub reply: ReplyMessage,
}
