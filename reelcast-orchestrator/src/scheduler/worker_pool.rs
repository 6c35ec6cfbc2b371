//! Worker pool
//!
//! Periodically admits pending jobs, up to a fixed concurrency ceiling, and
//! drives each one through render -> encode -> store. Each admitted job runs
//! in its own task holding a semaphore permit; the permit is released when the
//! task finishes, whatever the outcome.

use std::collections::HashSet;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use reelcast_core::domain::job::{Job, JobOutput, JobStatus};
use reelcast_core::dto::health::WorkerStatus;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::Ticker;
use crate::pipeline::{CompositionOptions, Encoder, Renderer, StageError};
use crate::repository::{ArtifactStore, JobStore, JobStoreError, StorageError};

const STEP_RENDERED: &str = "generating_screenshot";
const STEP_COMPOSED: &str = "composing_video";
const STEP_SAVED: &str = "saving_file";

/// How often `stop` re-checks the in-flight count while draining
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_concurrent_jobs: usize,
    pub poll_interval: Duration,
    /// Base URL prefixed to download links
    pub public_url: String,
    /// Parent of the per-job scratch directories
    pub work_dir: PathBuf,
    pub audio_asset: PathBuf,
    pub composition: CompositionOptions,
}

/// Why a job's pipeline run failed
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("render failed: {0}")]
    Render(#[source] StageError),

    #[error("encode failed: {0}")]
    Encode(#[source] StageError),

    #[error("failed to read encoded video: {0}")]
    Output(#[source] std::io::Error),

    #[error("failed to store video: {0}")]
    Storage(#[from] StorageError),

    #[error("job update rejected: {0}")]
    JobStore(#[from] JobStoreError),
}

/// Bounded pool processing pending jobs in the background
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: WorkerPoolConfig,
    jobs: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    renderer: Arc<dyn Renderer>,
    encoder: Arc<dyn Encoder>,
    slots: Arc<Semaphore>,
    /// Ids admitted and not yet finished
    processing: Mutex<HashSet<Uuid>>,
    running: AtomicBool,
    ticker: Mutex<Option<Ticker>>,
}

/// Bookkeeping for one admitted job; dropping it frees the slot.
struct InFlight {
    pool: Arc<PoolInner>,
    job_id: Uuid,
    _permit: OwnedSemaphorePermit,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.pool.processing_set().remove(&self.job_id);
    }
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        jobs: Arc<JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        renderer: Arc<dyn Renderer>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            inner: Arc::new(PoolInner {
                config,
                jobs,
                artifacts,
                renderer,
                encoder,
                slots,
                processing: Mutex::new(HashSet::new()),
                running: AtomicBool::new(false),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Starts the polling loop. The first poll happens immediately.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        info!(
            max_concurrent_jobs = self.inner.config.max_concurrent_jobs,
            poll_interval = ?self.inner.config.poll_interval,
            "Starting worker pool"
        );

        let pool = self.clone();
        let ticker = Ticker::spawn("worker-pool", self.inner.config.poll_interval, move || {
            let pool = pool.clone();
            async move {
                let admitted = pool.poll_once().await;
                if admitted > 0 {
                    info!("Admitted {} job(s) this cycle", admitted);
                }
            }
        });
        *self.inner.ticker_slot() = Some(ticker);
    }

    /// Admits as many pending jobs as there are free slots, oldest first.
    ///
    /// Admitted jobs are `processing` by the time this returns; their
    /// pipelines run in spawned tasks. Returns the number admitted.
    pub async fn poll_once(&self) -> usize {
        let available = self.inner.slots.available_permits();
        if available == 0 {
            debug!("All worker slots busy, skipping poll");
            return 0;
        }

        let pending = self.inner.jobs.list_by_status(JobStatus::Pending).await;
        if pending.is_empty() {
            return 0;
        }

        let mut admitted = 0;
        for job in pending.into_iter().take(available) {
            if self.inner.processing_set().contains(&job.id) {
                continue;
            }

            let Ok(permit) = self.inner.slots.clone().try_acquire_owned() else {
                debug!("Max concurrent jobs reached, leaving job {} pending", job.id);
                break;
            };

            self.inner.processing_set().insert(job.id);
            let guard = InFlight {
                pool: self.inner.clone(),
                job_id: job.id,
                _permit: permit,
            };

            if let Err(e) = self
                .inner
                .jobs
                .update_status(job.id, JobStatus::Processing, None)
                .await
            {
                // Pruned or moved on since listing; `guard` frees the slot.
                warn!(job_id = %job.id, error = %e, "Could not admit job");
                continue;
            }

            let pool = self.inner.clone();
            let span = info_span!("render_job", job_id = %job.id);
            tokio::spawn(
                async move {
                    pool.process(job).await;
                    drop(guard);
                }
                .instrument(span),
            );
            admitted += 1;
        }

        admitted
    }

    /// Stops admitting jobs and waits up to `grace` for in-flight ones.
    ///
    /// Returns `true` if every job finished within the grace period.
    pub async fn stop(&self, grace: Duration) -> bool {
        let ticker = self.inner.ticker_slot().take();
        if let Some(ticker) = ticker {
            ticker.stop().await;
        }
        self.inner.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + grace;
        loop {
            let in_flight = self.current_job_count();
            if in_flight == 0 {
                info!("Worker pool stopped");
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    in_flight,
                    grace = ?grace,
                    "Grace period elapsed with jobs still running"
                );
                return false;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Number of jobs currently holding a slot
    pub fn current_job_count(&self) -> usize {
        self.inner.config.max_concurrent_jobs - self.inner.slots.available_permits()
    }

    pub fn status(&self) -> WorkerStatus {
        let mut processing_jobs: Vec<Uuid> =
            self.inner.processing_set().iter().copied().collect();
        processing_jobs.sort();

        WorkerStatus {
            running: self.is_running(),
            current_job_count: self.current_job_count(),
            max_concurrent_jobs: self.inner.config.max_concurrent_jobs,
            processing_jobs,
        }
    }
}

impl PoolInner {
    fn processing_set(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.processing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticker_slot(&self) -> MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scratch_dir(&self, job_id: Uuid) -> PathBuf {
        self.config.work_dir.join(job_id.to_string())
    }

    async fn process(&self, job: Job) {
        let job_id = job.id;
        let started = Instant::now();
        info!("Processing job");

        let scratch = self.scratch_dir(job_id);
        let outcome = self.run_pipeline(&job, &scratch).await;
        remove_scratch(&scratch).await;

        match outcome {
            Ok(output) => {
                info!(
                    file = %output.file_name,
                    size = output.file_size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
            }
            Err(e) => {
                error!(error = %e, "Job failed");
                if let Err(store_err) = self
                    .jobs
                    .set_failed(job_id, e.to_string(), Some(error_chain(&e)))
                    .await
                {
                    warn!(error = %store_err, "Could not record job failure");
                }
            }
        }
    }

    async fn run_pipeline(&self, job: &Job, scratch: &Path) -> Result<JobOutput, PipelineError> {
        let job_id = job.id;
        let options = &self.config.composition;

        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(PipelineError::Workspace)?;

        let image = self
            .renderer
            .render(job_id, &job.request, scratch)
            .await
            .map_err(PipelineError::Render)?;
        self.jobs.update_progress(job_id, STEP_RENDERED, 20).await?;

        let video = self
            .encoder
            .encode(job_id, &image, &self.config.audio_asset, options, scratch)
            .await
            .map_err(PipelineError::Encode)?;
        self.jobs.update_progress(job_id, STEP_COMPOSED, 60).await?;

        let bytes = tokio::fs::read(&video)
            .await
            .map_err(PipelineError::Output)?;

        let mut extra = Map::new();
        extra.insert("jobId".into(), JsonValue::String(job_id.to_string()));
        extra.insert("handle".into(), JsonValue::String(job.request.handle.clone()));
        extra.insert("duration".into(), JsonValue::from(options.duration_secs));
        extra.insert("resolution".into(), JsonValue::String(options.resolution()));

        let saved = self
            .artifacts
            .save(&artifact_name(job_id), &bytes, extra)
            .await?;
        self.jobs.update_progress(job_id, STEP_SAVED, 80).await?;

        let output = JobOutput {
            download_url: format!(
                "{}/api/download/{}",
                self.config.public_url.trim_end_matches('/'),
                saved.name
            ),
            file_name: saved.name,
            expires_at: saved.metadata.expires_at,
            file_size: saved.size,
            duration_secs: options.duration_secs,
            resolution: options.resolution(),
        };
        self.jobs.set_completed(job_id, output.clone()).await?;

        Ok(output)
    }
}

/// Stored name of a job's video
pub fn artifact_name(job_id: Uuid) -> String {
    format!("reel_{job_id}.mp4")
}

async fn remove_scratch(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(path = %dir.display(), "Removed job scratch directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove intermediates"),
    }
}

/// Flattens an error and its sources into one line per cause.
///
/// A level whose message already ends with its source's message only keeps
/// its own prefix, so each cause appears once.
fn error_chain(err: &dyn StdError) -> String {
    let mut lines = Vec::new();
    let mut current = Some(err);
    while let Some(level) = current {
        let message = level.to_string();
        let own = match level.source() {
            Some(cause) => message
                .strip_suffix(&format!(": {cause}"))
                .map(str::to_string)
                .unwrap_or(message),
            None => message,
        };
        if lines.is_empty() {
            lines.push(own);
        } else {
            lines.push(format!("caused by: {own}"));
        }
        current = level.source();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::LocalArtifactStore;
    use async_trait::async_trait;
    use reelcast_core::clock::{Clock, SystemClock};
    use reelcast_core::domain::job::{JobRequest, JobStats, Theme};
    use tempfile::TempDir;

    /// Renderer that waits for a permit from `gate` before producing a card.
    struct GatedRenderer {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Renderer for GatedRenderer {
        async fn render(
            &self,
            job_id: Uuid,
            request: &JobRequest,
            work_dir: &Path,
        ) -> Result<PathBuf, StageError> {
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();

            let path = work_dir.join(format!("card_{job_id}.png"));
            tokio::fs::write(&path, b"png").await?;

            if request.text == "boom" {
                return Err(StageError::Failed {
                    program: "renderer".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "page crashed".to_string(),
                });
            }
            Ok(path)
        }
    }

    struct CopyEncoder;

    #[async_trait]
    impl Encoder for CopyEncoder {
        async fn encode(
            &self,
            job_id: Uuid,
            image: &Path,
            _audio: &Path,
            _options: &CompositionOptions,
            work_dir: &Path,
        ) -> Result<PathBuf, StageError> {
            let path = work_dir.join(format!("reel_{job_id}.mp4"));
            let mut bytes = tokio::fs::read(image).await?;
            bytes.extend_from_slice(b"-video");
            tokio::fs::write(&path, bytes).await?;
            Ok(path)
        }
    }

    struct Fixture {
        _dir: TempDir,
        work_dir: PathBuf,
        gate: Arc<Semaphore>,
        jobs: Arc<JobStore>,
        artifacts: Arc<LocalArtifactStore>,
        pool: WorkerPool,
    }

    fn fixture(max_concurrent_jobs: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let jobs = Arc::new(JobStore::new(clock.clone()));
        let artifacts =
            Arc::new(LocalArtifactStore::new(dir.path().join("videos"), 24, clock).unwrap());
        let gate = Arc::new(Semaphore::new(0));
        let work_dir = dir.path().join("work");

        let pool = WorkerPool::new(
            WorkerPoolConfig {
                max_concurrent_jobs,
                poll_interval: Duration::from_millis(20),
                public_url: "http://localhost:8080/".to_string(),
                work_dir: work_dir.clone(),
                audio_asset: dir.path().join("audio.mp3"),
                composition: CompositionOptions::default(),
            },
            jobs.clone(),
            artifacts.clone(),
            Arc::new(GatedRenderer { gate: gate.clone() }),
            Arc::new(CopyEncoder),
        );

        Fixture {
            _dir: dir,
            work_dir,
            gate,
            jobs,
            artifacts,
            pool,
        }
    }

    fn request(text: &str) -> JobRequest {
        JobRequest {
            text: text.to_string(),
            image_url: "https://example.com/avatar.png".to_string(),
            display_name: "Jane".to_string(),
            handle: "jane".to_string(),
            theme: Theme::Light,
        }
    }

    async fn wait_for(jobs: &JobStore, done: impl Fn(&JobStats) -> bool) -> JobStats {
        for _ in 0..500 {
            let stats = jobs.stats().await;
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached, stats: {:?}", jobs.stats().await);
    }

    #[tokio::test]
    async fn test_admission_respects_ceiling() {
        let f = fixture(2);
        let first = f.jobs.create(request("one")).await;
        let second = f.jobs.create(request("two")).await;
        let third = f.jobs.create(request("three")).await;

        assert_eq!(f.pool.poll_once().await, 2);

        let stats = f.jobs.stats().await;
        assert_eq!(stats.processing, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(f.pool.current_job_count(), 2);
        assert_eq!(f.jobs.get(third.id).await.unwrap().status, JobStatus::Pending);

        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(f.pool.status().processing_jobs, expected);

        // No free slot, nothing admitted
        assert_eq!(f.pool.poll_once().await, 0);

        f.gate.add_permits(1);
        wait_for(&f.jobs, |s| s.completed == 1).await;
        for _ in 0..100 {
            if f.pool.current_job_count() < 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(f.pool.poll_once().await, 1);
        assert_eq!(f.jobs.get(third.id).await.unwrap().status, JobStatus::Processing);

        f.gate.add_permits(2);
        wait_for(&f.jobs, |s| s.completed == 3).await;
    }

    #[tokio::test]
    async fn test_ceiling_never_exceeded() {
        let f = fixture(3);
        for i in 0..8 {
            f.jobs.create(request(&format!("job {i}"))).await;
        }

        for _ in 0..200 {
            f.pool.poll_once().await;
            let stats = f.jobs.stats().await;
            assert!(stats.processing <= 3);
            assert!(f.pool.current_job_count() <= 3);
            if stats.completed == 8 {
                return;
            }
            f.gate.add_permits(1);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("jobs did not complete: {:?}", f.jobs.stats().await);
    }

    #[tokio::test]
    async fn test_completed_job_has_downloadable_output() {
        let f = fixture(1);
        let job = f.jobs.create(request("hello")).await;
        f.gate.add_permits(1);

        f.pool.poll_once().await;
        wait_for(&f.jobs, |s| s.completed == 1).await;

        let job = f.jobs.get(job.id).await.unwrap();
        let output = job.result.unwrap();
        assert_eq!(output.file_name, format!("reel_{}.mp4", job.id));
        assert_eq!(
            output.download_url,
            format!("http://localhost:8080/api/download/reel_{}.mp4", job.id)
        );
        assert_eq!(output.resolution, "1080x1920");
        assert_eq!(job.progress.percent, 100);
        assert!(job.completed_at.is_some());

        let bytes = f.artifacts.get(&output.file_name).await.unwrap();
        assert_eq!(bytes, b"png-video");
        assert_eq!(output.file_size, bytes.len() as u64);

        let metadata = f.artifacts.metadata(&output.file_name).await.unwrap();
        assert_eq!(metadata.extra["jobId"], job.id.to_string());
        assert_eq!(metadata.extra["handle"], "jane");

        assert!(!f.work_dir.join(job.id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_isolated() {
        let f = fixture(2);
        let bad = f.jobs.create(request("boom")).await;
        let good = f.jobs.create(request("fine")).await;
        f.gate.add_permits(2);

        assert_eq!(f.pool.poll_once().await, 2);
        wait_for(&f.jobs, |s| s.failed == 1 && s.completed == 1).await;

        let bad = f.jobs.get(bad.id).await.unwrap();
        let failure = bad.error.unwrap();
        assert!(failure.message.contains("render failed"));
        assert!(failure.message.contains("page crashed"));
        let trace = failure.trace.unwrap();
        assert_eq!(trace.matches("page crashed").count(), 1);
        assert!(trace.starts_with("render failed\ncaused by: "));
        assert!(bad.result.is_none());
        assert!(!f.work_dir.join(bad.id.to_string()).exists());

        assert_eq!(
            f.jobs.get(good.id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_already_processing_id_is_skipped() {
        let f = fixture(2);
        let job = f.jobs.create(request("dup")).await;
        f.pool.inner.processing_set().insert(job.id);

        assert_eq!(f.pool.poll_once().await, 0);
        assert_eq!(f.jobs.get(job.id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop_and_stop_drains() {
        let f = fixture(2);
        f.jobs.create(request("a")).await;
        f.jobs.create(request("b")).await;
        f.gate.add_permits(2);

        f.pool.start();
        f.pool.start();
        assert!(f.pool.is_running());

        wait_for(&f.jobs, |s| s.completed == 2).await;
        assert!(f.pool.stop(Duration::from_secs(5)).await);
        assert!(!f.pool.is_running());
        assert_eq!(f.pool.current_job_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_gives_up_after_grace() {
        let f = fixture(1);
        f.jobs.create(request("stuck")).await;
        f.pool.poll_once().await;

        assert!(!f.pool.stop(Duration::from_millis(150)).await);
        assert_eq!(f.pool.current_job_count(), 1);

        f.gate.add_permits(1);
        wait_for(&f.jobs, |s| s.completed == 1).await;
    }

    #[test]
    fn test_error_chain_lists_causes() {
        let err = PipelineError::Encode(StageError::InvalidInput("no audio".to_string()));
        assert_eq!(
            error_chain(&err),
            "encode failed\ncaused by: invalid stage input: no audio"
        );
    }

    #[test]
    fn test_error_chain_names_each_cause_once() {
        let io = std::io::Error::other("disk full");
        let err = PipelineError::Storage(StorageError::Io(io));
        assert_eq!(
            error_chain(&err),
            "failed to store video\ncaused by: storage io error\ncaused by: disk full"
        );
        assert_eq!(err.to_string(), "failed to store video: storage io error: disk full");
    }
}
