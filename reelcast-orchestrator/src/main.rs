use std::sync::Arc;

use anyhow::Context;
use reelcast_core::clock::{Clock, SystemClock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod pipeline;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod shutdown;

use crate::api::AppState;
use crate::config::Config;
use crate::pipeline::{CommandRenderer, FfmpegEncoder};
use crate::repository::{ArtifactStore, JobStore, LocalArtifactStore};
use crate::scheduler::{RetentionSweeper, WorkerPool, WorkerPoolConfig};
use crate::service::RequestAuthenticator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelcast_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Reelcast Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let jobs = Arc::new(JobStore::new(clock.clone()));
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(
        LocalArtifactStore::new(&config.storage_dir, config.artifact_ttl_hours, clock.clone())
            .context("Failed to open artifact storage")?,
    );

    let worker = WorkerPool::new(
        WorkerPoolConfig {
            max_concurrent_jobs: config.max_concurrent_jobs,
            poll_interval: config.poll_interval,
            public_url: config.public_url.clone(),
            work_dir: config.work_dir.clone(),
            audio_asset: config.audio_asset.clone(),
            composition: config.composition.clone(),
        },
        jobs.clone(),
        artifacts.clone(),
        Arc::new(CommandRenderer::new(&config.render_command)),
        Arc::new(FfmpegEncoder::new(&config.ffmpeg_path)),
    );
    let sweeper = RetentionSweeper::new(
        jobs.clone(),
        artifacts.clone(),
        config.sweep_interval_minutes,
        config.job_retention_hours,
    );

    worker.start();
    sweeper.start();

    let state = AppState {
        jobs,
        artifacts,
        authenticator: Arc::new(RequestAuthenticator::new(config.hmac_secret.clone(), clock)),
        worker: worker.clone(),
        sweeper: sweeper.clone(),
    };

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!(
        grace_secs = config.shutdown_grace.as_secs(),
        "HTTP server stopped, draining background work"
    );

    if !worker.stop(config.shutdown_grace).await {
        tracing::warn!("Some jobs were still running at exit");
    }
    sweeper.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
