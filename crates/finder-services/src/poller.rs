//! Resource poller: keeps the resource cache in step with the compute
//! endpoints this node fronts.
//!
//! Every refresh polls all configured endpoints concurrently. A successful
//! poll replaces the endpoint's entry; a failed one counts toward eviction.
//! Refreshes never overlap: a tick that finds the previous refresh still
//! running is skipped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use finder_core::ResourceDescriptor;

use crate::periodic::{run_periodic, FirstRun, NonReentrant};
use crate::resource_cache::ResourceCache;
use crate::transport::TransportError;

/// Resources reported by one endpoint at one moment.
#[derive(Debug, Clone)]
pub struct Detection {
    pub resources: HashSet<ResourceDescriptor>,
    pub detected_at_ms: u64,
}

/// Asks a compute endpoint which resources it currently has enabled.
#[async_trait]
pub trait ResourceProbe: Send + Sync + 'static {
    async fn try_get_resources(&self, endpoint: &str) -> Result<Detection, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Detected,
    Failed,
    /// Failed, and the failure limit was reached.
    Evicted,
}

/// Outcome counts of one refresh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub detected: usize,
    pub failed: usize,
    pub evicted: usize,
}

#[derive(Clone)]
pub struct ResourceCacheUpdater {
    cache: ResourceCache,
    probe: Arc<dyn ResourceProbe>,
    endpoints: Arc<Vec<String>>,
    failure_limit: u32,
    guard: NonReentrant,
}

impl ResourceCacheUpdater {
    pub fn new(
        cache: ResourceCache,
        probe: Arc<dyn ResourceProbe>,
        endpoints: Vec<String>,
        failure_limit: u32,
    ) -> Self {
        Self {
            cache,
            probe,
            endpoints: Arc::new(endpoints),
            failure_limit,
            guard: NonReentrant::new(),
        }
    }

    /// Poll one endpoint and apply the result to the cache.
    pub async fn refresh(&self, endpoint: &str) -> PollOutcome {
        match self.probe.try_get_resources(endpoint).await {
            Ok(detection) => {
                tracing::debug!(
                    endpoint,
                    resources = detection.resources.len(),
                    "resources detected"
                );
                self.cache
                    .update_on_detection(endpoint, detection.resources, detection.detected_at_ms);
                PollOutcome::Detected
            }
            Err(e) => {
                if self.cache.update_on_failure(endpoint, self.failure_limit) {
                    tracing::info!(endpoint, error = %e, "endpoint evicted after repeated failures");
                    PollOutcome::Evicted
                } else {
                    tracing::debug!(endpoint, error = %e, "resource poll failed");
                    PollOutcome::Failed
                }
            }
        }
    }

    /// Poll every endpoint concurrently. Returns `None` if a refresh is
    /// already running.
    pub async fn refresh_all(&self) -> Option<RefreshSummary> {
        let _running = self.guard.try_enter()?;

        let outcomes =
            futures::future::join_all(self.endpoints.iter().map(|ep| self.refresh(ep))).await;

        let mut summary = RefreshSummary::default();
        for outcome in outcomes {
            match outcome {
                PollOutcome::Detected => summary.detected += 1,
                PollOutcome::Failed => summary.failed += 1,
                PollOutcome::Evicted => {
                    summary.failed += 1;
                    summary.evicted += 1;
                }
            }
        }
        tracing::debug!(
            detected = summary.detected,
            failed = summary.failed,
            evicted = summary.evicted,
            cached = self.cache.len(),
            "resource cache refreshed"
        );
        Some(summary)
    }

    /// Refresh immediately, then every `period`, until shutdown.
    pub async fn run(self, period: Duration, shutdown: broadcast::Receiver<()>) {
        if self.endpoints.is_empty() {
            tracing::info!("no resource endpoints configured, poller idle");
            return;
        }
        tracing::info!(endpoints = self.endpoints.len(), period_secs = period.as_secs(), "resource poller starting");
        run_periodic("resource-refresh", period, FirstRun::Immediately, shutdown, move || {
            let updater = self.clone();
            async move {
                updater.refresh_all().await;
            }
        })
        .await;
    }
}
