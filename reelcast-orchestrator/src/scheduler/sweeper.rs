//! Retention sweeper
//!
//! Periodically evicts expired artifacts and prunes old job records. A sweep
//! runs immediately on start and then once per interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reelcast_core::dto::health::SweeperStatus;
use tracing::{info, warn};

use super::Ticker;
use crate::config::MAX_SWEEP_INTERVAL_MINUTES;
use crate::repository::{ArtifactStore, JobStore, StorageError};

/// A sub-step of a sweep that failed
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("artifact eviction failed: {0}")]
    ArtifactEviction(#[source] StorageError),
}

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub artifacts_removed: usize,
    pub jobs_removed: usize,
    pub errors: Vec<SchedulerError>,
}

#[derive(Clone)]
pub struct RetentionSweeper {
    inner: Arc<SweeperInner>,
}

struct SweeperInner {
    jobs: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    interval_minutes: u64,
    retention_hours: u64,
    running: AtomicBool,
    ticker: Mutex<Option<Ticker>>,
}

impl RetentionSweeper {
    pub fn new(
        jobs: Arc<JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        interval_minutes: u64,
        retention_hours: u64,
    ) -> Self {
        Self {
            inner: Arc::new(SweeperInner {
                jobs,
                artifacts,
                interval_minutes,
                retention_hours,
                running: AtomicBool::new(false),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("Retention sweeper already running");
            return;
        }

        info!(
            interval_minutes = self.inner.interval_minutes,
            retention_hours = self.inner.retention_hours,
            "Starting retention sweeper"
        );

        let sweeper = self.clone();
        let period = self.inner.period();
        let ticker = Ticker::spawn("retention-sweeper", period, move || {
            let sweeper = sweeper.clone();
            async move {
                sweeper.cleanup().await;
            }
        });
        *self.inner.ticker_slot() = Some(ticker);
    }

    /// Stops the timer. Safe to call when not running.
    pub async fn stop(&self) {
        let ticker = self.inner.ticker_slot().take();
        if let Some(ticker) = ticker {
            ticker.stop().await;
            info!("Retention sweeper stopped");
        }
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Runs one sweep. A failing step is reported and does not prevent the
    /// others from running.
    pub async fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        match self.inner.artifacts.evict_expired().await {
            Ok(removed) => report.artifacts_removed = removed,
            Err(e) => {
                warn!(error = %e, "Artifact eviction failed");
                report.errors.push(SchedulerError::ArtifactEviction(e));
            }
        }

        report.jobs_removed = self
            .inner
            .jobs
            .cleanup_expired(self.inner.retention_hours)
            .await;

        info!(
            artifacts_removed = report.artifacts_removed,
            jobs_removed = report.jobs_removed,
            errors = report.errors.len(),
            "Retention sweep finished"
        );
        report
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SweeperStatus {
        SweeperStatus {
            running: self.is_running(),
            interval_minutes: self.inner.interval_minutes,
            retention_hours: self.inner.retention_hours,
        }
    }
}

impl SweeperInner {
    fn period(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.min(MAX_SWEEP_INTERVAL_MINUTES) * 60)
    }

    fn ticker_slot(&self) -> MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
