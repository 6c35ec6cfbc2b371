//! Health Check API Handler
//!
//! Read-only snapshot of job counts and background task state.

use axum::{Json, extract::State};
use reelcast_core::dto::health::HealthResponse;

use crate::api::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        jobs: state.jobs.stats().await,
        worker: state.worker.status(),
        sweeper: state.sweeper.status(),
    })
}
