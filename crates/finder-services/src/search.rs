//! Search cache — in-flight searches started by this node and their results.
//!
//! One entry per `SearchCriteria`. The first client asking for a criteria
//! starts a flood; everyone asking for the same criteria before the entry
//! expires gets a snapshot of what has been found so far instead. Replies
//! reaching this node merge their endpoints into the entry.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;

use finder_core::SearchCriteria;

use crate::periodic::{run_periodic, FirstRun};

/// Accumulated result of one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub started_at: Instant,
    found: BTreeSet<String>,
}

impl SearchResult {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            found: BTreeSet::new(),
        }
    }

    /// Add one endpoint. Returns false if it was already present.
    pub fn add(&mut self, endpoint: impl Into<String>) -> bool {
        self.found.insert(endpoint.into())
    }

    /// Merge endpoints. Returns true if the set grew.
    pub fn extend<I, S>(&mut self, endpoints: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.found.len();
        self.found.extend(endpoints.into_iter().map(Into::into));
        self.found.len() > before
    }

    pub fn remove(&mut self, endpoint: &str) -> bool {
        self.found.remove(endpoint)
    }

    pub fn found_endpoints(&self) -> &BTreeSet<String> {
        &self.found
    }

    pub fn into_endpoints(self) -> BTreeSet<String> {
        self.found
    }
}

/// Outcome of asking to start a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStart {
    /// No unexpired search existed; an empty entry was created and the
    /// caller should originate a flood.
    New,
    /// An identical search is already in flight. Snapshot of its results.
    InFlight(SearchResult),
}

/// Criteria → result, shared between the client-facing finder, the
/// protocol handler and the sweeper.
#[derive(Clone)]
pub struct SearchCache {
    searches: Arc<DashMap<SearchCriteria, SearchResult>>,
    expiry: Duration,
}

impl SearchCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            searches: Arc::new(DashMap::new()),
            expiry,
        }
    }

    /// Register a search unless an identical one is already in flight.
    pub fn try_enqueue_new_search(&self, criteria: &SearchCriteria) -> SearchStart {
        let now = Instant::now();
        match self.searches.entry(criteria.clone()) {
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.insert(SearchResult::new(now));
                    SearchStart::New
                } else {
                    SearchStart::InFlight(occupied.get().clone())
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SearchResult::new(now));
                SearchStart::New
            }
        }
    }

    /// Merge endpoints into the matching unexpired search.
    ///
    /// Returns false if there is no such search: it expired or was removed,
    /// so the reply arrived too late. A late update never recreates it.
    pub fn update_result<I, S>(&self, criteria: &SearchCriteria, endpoints: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Instant::now();
        match self.searches.entry(criteria.clone()) {
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.remove();
                    return false;
                }
                occupied.get_mut().extend(endpoints);
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Snapshot of an unexpired search.
    pub fn try_get_result_copy(&self, criteria: &SearchCriteria) -> Option<SearchResult> {
        let now = Instant::now();
        let result = self.searches.get(criteria).map(|r| r.value().clone())?;
        if self.is_expired(&result, now) {
            self.searches
                .remove_if(criteria, |_, r| self.is_expired(r, now));
            return None;
        }
        Some(result)
    }

    /// Drop a search, e.g. to roll back when its flood could not be started.
    pub fn remove(&self, criteria: &SearchCriteria) -> bool {
        self.searches.remove(criteria).is_some()
    }

    /// Remove searches started more than the expiry interval ago.
    pub fn clean(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.searches.retain(|_, r| {
            let keep = !self.is_expired(r, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }

    /// Sweep expired searches every `period` until shutdown.
    pub async fn run_sweeper(self, period: Duration, shutdown: broadcast::Receiver<()>) {
        run_periodic("search-sweep", period, FirstRun::AfterPeriod, shutdown, move || {
            let cache = self.clone();
            async move {
                let removed = cache.clean();
                tracing::debug!(removed, pending = cache.len(), "search cache swept");
            }
        })
        .await;
    }

    fn is_expired(&self, result: &SearchResult, now: Instant) -> bool {
        result.started_at + self.expiry < now
    }
}
