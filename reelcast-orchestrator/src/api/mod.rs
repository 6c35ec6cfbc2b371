//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod download;
pub mod error;
pub mod health;
pub mod job;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::repository::{ArtifactStore, JobStore};
use crate::scheduler::{RetentionSweeper, WorkerPool};
use crate::service::RequestAuthenticator;

/// Shared handles for every request handler
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub authenticator: Arc<RequestAuthenticator>,
    pub worker: WorkerPool,
    pub sweeper: RetentionSweeper,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/api/jobs", post(job::create_job).get(job::list_jobs))
        .route("/api/jobs/{id}", get(job::get_job))
        // Artifact download
        .route("/api/download/{name}", get(download::download))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
