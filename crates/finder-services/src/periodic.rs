//! Periodic background jobs.
//!
//! A job runs once per period until shutdown. If a run is still in progress
//! when the next tick fires, that tick is skipped: runs of the same job never
//! overlap.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Admits at most one holder at a time. `try_enter` never waits.
#[derive(Clone, Default)]
pub struct NonReentrant {
    busy: Arc<AtomicBool>,
}

/// Releases the guard on drop.
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl NonReentrant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<RunGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// When the first run happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRun {
    Immediately,
    AfterPeriod,
}

/// Run `job` every `period` until `shutdown` fires.
///
/// Each run is spawned so a slow run does not delay the timer. Ticks that
/// find the previous run still active are skipped and logged.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    first: FirstRun,
    mut shutdown: broadcast::Receiver<()>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let start = match first {
        FirstRun::Immediately => tokio::time::Instant::now(),
        FirstRun::AfterPeriod => tokio::time::Instant::now() + period,
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let guard = NonReentrant::new();

    tracing::debug!(job = name, period_secs = period.as_secs_f64(), "periodic job started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(job = name, "periodic job stopping");
                return;
            }
            _ = interval.tick() => {
                let Some(run) = guard.try_enter() else {
                    tracing::debug!(job = name, "previous run still active, skipping tick");
                    continue;
                };
                let fut = job();
                tokio::spawn(async move {
                    fut.await;
                    drop(run);
                });
            }
        }
    }
}
