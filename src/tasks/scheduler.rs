use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::surface::{DisplaySurface, RefreshOutcome};

/// Drives one surface: an immediate refresh, then one every `period`.
///
/// Returns when either the surface or the process-wide token is cancelled.
/// Per-cycle failures are logged by the surface and never end the loop.
pub async fn run<C: Catalog>(
    surface: Arc<DisplaySurface<C>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let closed = surface.cancel_token().clone();
    info!(surface = surface.id(), period = ?period, "surface scheduler started");

    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = closed.cancelled() => break,
            _ = ticker.tick() => {
                let outcome = select! {
                    _ = closed.cancelled() => RefreshOutcome::Closed,
                    outcome = surface.refresh_at(Utc::now()) => outcome,
                };
                debug!(surface = surface.id(), ?outcome, "refresh cycle finished");
                if outcome == RefreshOutcome::Closed {
                    break;
                }
            }
        }
    }
    info!(surface = surface.id(), "surface scheduler stopped");
}

struct Scheduled<C> {
    surface: Arc<DisplaySurface<C>>,
    task: JoinHandle<()>,
}

/// Every live surface together with the task refreshing it.
pub struct Slideshow<C> {
    period: Duration,
    cancel: CancellationToken,
    surfaces: Mutex<BTreeMap<String, Scheduled<C>>>,
}

impl<C: Catalog> Slideshow<C> {
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        Self {
            period,
            cancel,
            surfaces: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers `surface` and spawns its refresh loop. A surface with the
    /// same id is torn down first.
    pub async fn add(&self, surface: DisplaySurface<C>) -> Arc<DisplaySurface<C>> {
        let surface = Arc::new(surface);
        let task = tokio::spawn(run(surface.clone(), self.period, self.cancel.clone()));
        let replaced = self.lock().insert(
            surface.id().to_string(),
            Scheduled {
                surface: surface.clone(),
                task,
            },
        );
        if let Some(old) = replaced {
            warn!(surface = surface.id(), "replacing an existing surface");
            stop(old).await;
        }
        surface
    }

    pub fn get(&self, id: &str) -> Option<Arc<DisplaySurface<C>>> {
        self.lock().get(id).map(|s| s.surface.clone())
    }

    /// Surfaces ordered by id.
    pub fn list(&self) -> Vec<Arc<DisplaySurface<C>>> {
        self.lock().values().map(|s| s.surface.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cancels the surface's timer and waits for its loop to exit.
    /// Returns false for unknown ids.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(scheduled) => {
                stop(scheduled).await;
                info!(surface = id, "surface removed");
                true
            }
            None => false,
        }
    }

    pub async fn shutdown(&self) {
        let all: Vec<_> = std::mem::take(&mut *self.lock()).into_values().collect();
        for scheduled in all {
            stop(scheduled).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Scheduled<C>>> {
        self.surfaces.lock().unwrap_or_else(|p| p.into_inner())
    }
}

async fn stop<C: Catalog>(scheduled: Scheduled<C>) {
    scheduled.surface.close();
    if let Err(err) = scheduled.task.await {
        warn!(surface = scheduled.surface.id(), error = %err, "surface task ended abnormally");
    }
}
