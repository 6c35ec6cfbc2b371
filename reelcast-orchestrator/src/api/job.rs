//! Job API Handlers
//!
//! HTTP endpoints for submitting jobs and following their progress.

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use reelcast_core::domain::job::JobStatus;
use reelcast_core::dto::job::{CreateJobResponse, JobStatusResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::job_service;

/// POST /api/jobs
/// Verify the request signature, then enqueue a new job
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    state.authenticator.verify_headers(&headers, &body)?;

    let job = job_service::create_job(&state.jobs, &body).await?;

    Ok((StatusCode::CREATED, Json(CreateJobResponse::from(&job))))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid job id: {}", id)))?;
    tracing::debug!("Getting job: {}", id);

    let job = job_service::get_job(&state.jobs, id).await?;
    Ok(Json(JobStatusResponse::from(&job)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
}

/// GET /api/jobs?status=
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobStatusResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(JobStatus::from_str)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let jobs = job_service::list_jobs(&state.jobs, status).await;
    Ok(Json(jobs.iter().map(JobStatusResponse::from).collect()))
}
