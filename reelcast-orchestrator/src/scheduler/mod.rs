//! Scheduler layer
//!
//! Timer-driven background work:
//! - `worker_pool`: admits pending jobs and drives them through the pipeline
//! - `sweeper`: reclaims expired artifacts and stale job records

pub mod sweeper;
pub mod worker_pool;

pub use sweeper::{CleanupReport, RetentionSweeper, SchedulerError};
pub use worker_pool::{PipelineError, WorkerPool, WorkerPoolConfig};

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// A periodic background task that can be stopped.
///
/// The first tick fires immediately.
pub(crate) struct Ticker {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn<F, Fut>(name: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => on_tick().await,
                    _ = stop.changed() => break,
                }
            }

            debug!(ticker = name, "Ticker stopped");
        });

        Self {
            name,
            shutdown,
            handle,
        }
    }

    /// Stops future ticks and waits for the current one, if any, to finish.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(ticker = self.name, error = %e, "Ticker task ended abnormally");
        }
    }
}
