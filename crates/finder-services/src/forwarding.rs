//! Forwarding table — duplicate suppression and reverse-path bookkeeping.
//!
//! Every query this node originates or forwards is recorded here by message
//! id, together with where it came from: a neighbor (so a reply can be sent
//! back to it) or a local search (so a reply that reaches its destination
//! lands in the right search cache entry). Entries are never mutated after
//! insertion and expire after a fixed interval. Expired entries are treated
//! as absent and removed lazily on access, or in bulk by `clean`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use finder_core::{MessageId, NodeId, SearchCriteria};

/// Where a recorded message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Received from this neighbor. Replies are routed back to it.
    Neighbor(NodeId),
    /// Originated by this node for the given search.
    Local(SearchCriteria),
}

/// A forwarding table record.
#[derive(Debug, Clone)]
pub struct ForwardingEntry {
    pub origin: Origin,
    pub inserted_at: Instant,
}

impl ForwardingEntry {
    /// The neighbor the message arrived from, `None` for locally originated searches.
    pub fn source_neighbor(&self) -> Option<&NodeId> {
        match &self.origin {
            Origin::Neighbor(id) => Some(id),
            Origin::Local(_) => None,
        }
    }

    /// The search this message was created for, `None` for forwarded messages.
    pub fn search_ref(&self) -> Option<&SearchCriteria> {
        match &self.origin {
            Origin::Local(criteria) => Some(criteria),
            Origin::Neighbor(_) => None,
        }
    }
}

/// Message id → origin, shared between the protocol handler and its sweeper.
#[derive(Clone)]
pub struct ForwardingTable {
    entries: Arc<DashMap<MessageId, ForwardingEntry>>,
    expiry: Duration,
}

impl ForwardingTable {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            expiry,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Record a message. Returns false if an unexpired entry with the same
    /// id already exists; such a message is a duplicate and is not
    /// forwarded again.
    pub fn add(&self, msg_id: MessageId, origin: Origin) -> bool {
        let now = Instant::now();
        match self.entries.entry(msg_id) {
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.insert(ForwardingEntry {
                        origin,
                        inserted_at: now,
                    });
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ForwardingEntry {
                    origin,
                    inserted_at: now,
                });
                true
            }
        }
    }

    pub fn contains_entry(&self, msg_id: &MessageId) -> bool {
        self.get_entry(msg_id).is_some()
    }

    /// Copy of the unexpired entry for `msg_id`, if any.
    pub fn get_entry(&self, msg_id: &MessageId) -> Option<ForwardingEntry> {
        let now = Instant::now();
        let entry = self.entries.get(msg_id).map(|e| e.value().clone())?;
        if self.is_expired(&entry, now) {
            self.entries
                .remove_if(msg_id, |_, e| self.is_expired(e, now));
            return None;
        }
        Some(entry)
    }

    /// Origin of `msg_id`, if the message is known and unexpired.
    pub fn lookup(&self, msg_id: &MessageId) -> Option<Origin> {
        self.get_entry(msg_id).map(|e| e.origin)
    }

    /// Remove entries older than the expiry interval. Returns how many were removed.
    pub fn clean(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = !self.is_expired(e, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Remove every entry that arrived from `neighbor`. Returns how many were removed.
    pub fn clean_neighbor(&self, neighbor: &NodeId) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = e.source_neighbor() != Some(neighbor);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &ForwardingEntry, now: Instant) -> bool {
        entry.inserted_at + self.expiry < now
    }
}
