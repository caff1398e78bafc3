//! Resource cache — what each polled compute endpoint currently offers.
//!
//! Entries are replaced wholesale on every successful poll and evicted once
//! an endpoint fails to answer `failure_limit` polls in a row. The cache does
//! not know how it is refreshed; see `poller` for that.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use finder_core::{ResourceDescriptor, SearchCriteria};

/// Cached state of one compute endpoint.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub resources: HashSet<ResourceDescriptor>,
    /// Unix ms of the last successful poll.
    pub last_detected_ms: u64,
    pub consecutive_failures: u32,
}

/// Endpoint URI → advertised resources.
#[derive(Clone, Default)]
pub struct ResourceCache {
    entries: Arc<DashMap<String, ResourceEntry>>,
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Replace the entry for `endpoint` and reset its failure counter.
    pub fn update_on_detection<I>(&self, endpoint: &str, resources: I, detected_at_ms: u64)
    where
        I: IntoIterator<Item = ResourceDescriptor>,
    {
        self.entries.insert(
            endpoint.to_string(),
            ResourceEntry {
                resources: resources.into_iter().collect(),
                last_detected_ms: detected_at_ms,
                consecutive_failures: 0,
            },
        );
    }

    /// Count a failed poll. The counter saturates at `failure_limit`; the
    /// entry is evicted when it gets there. Returns true only for the call
    /// that evicts. Unknown endpoints are ignored.
    pub fn update_on_failure(&self, endpoint: &str, failure_limit: u32) -> bool {
        let evict = match self.entries.get_mut(endpoint) {
            Some(mut entry) => {
                if entry.consecutive_failures < failure_limit {
                    entry.consecutive_failures += 1;
                }
                entry.consecutive_failures == failure_limit
            }
            None => false,
        };
        evict
            && self
                .entries
                .remove_if(endpoint, |_, e| e.consecutive_failures == failure_limit)
                .is_some()
    }

    /// Endpoints whose entry satisfies `select`.
    pub fn search<F>(&self, mut select: F) -> Vec<String>
    where
        F: FnMut(&str, &HashSet<ResourceDescriptor>) -> bool,
    {
        self.entries
            .iter()
            .filter(|e| select(e.key(), &e.value().resources))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Endpoints offering a resource that matches `criteria`.
    pub fn find_matching(&self, criteria: &SearchCriteria) -> Vec<String> {
        self.search(|_, resources| criteria.matches_any(resources))
    }

    /// Copy of the whole cache, sorted by endpoint.
    pub fn snapshot(&self) -> Vec<(String, ResourceEntry)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn get(&self, endpoint: &str) -> Option<ResourceEntry> {
        self.entries.get(endpoint).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
