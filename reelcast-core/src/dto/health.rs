//! Health and status DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobStats;

/// Snapshot of the worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub running: bool,
    pub current_job_count: usize,
    pub max_concurrent_jobs: usize,
    pub processing_jobs: Vec<Uuid>,
}

/// Snapshot of the retention sweeper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweeperStatus {
    pub running: bool,
    pub interval_minutes: u64,
    pub retention_hours: u64,
}

/// GET /health payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub jobs: JobStats,
    pub worker: WorkerStatus,
    pub sweeper: SweeperStatus,
}
