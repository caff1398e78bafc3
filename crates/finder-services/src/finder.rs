//! Client-facing search.
//!
//! A search answers immediately with whatever is known: local matches from
//! the resource cache plus the results gathered so far by an identical
//! in-flight search. If no such search exists, one is started and the
//! client is expected to ask again later for remote results.

use std::collections::BTreeSet;

use finder_core::SearchCriteria;

use crate::handler::CommunicationHandler;
use crate::search::SearchStart;

#[derive(Clone)]
pub struct ProcessingServiceFinder {
    handler: CommunicationHandler,
}

impl ProcessingServiceFinder {
    pub fn new(handler: CommunicationHandler) -> Self {
        Self { handler }
    }

    /// Endpoints currently known to offer `criteria`, deduplicated.
    pub fn search(&self, criteria: &SearchCriteria) -> Vec<String> {
        tracing::debug!(%criteria, "search requested");

        let mut found: BTreeSet<String> = self
            .handler
            .resources()
            .find_matching(criteria)
            .into_iter()
            .collect();

        match self.handler.searches().try_enqueue_new_search(criteria) {
            SearchStart::InFlight(result) => {
                found.extend(result.into_endpoints());
            }
            SearchStart::New => {
                if self.handler.create_new_search(criteria) {
                    tracing::info!(%criteria, "new search started");
                } else {
                    tracing::warn!(%criteria, "could not start search, rolling back");
                    self.handler.searches().remove(criteria);
                }
            }
        }

        found.into_iter().collect()
    }
}
