//! Download API Handler
//!
//! Serves stored videos by name.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::repository::artifact::validate_name;

/// Media type of every artifact the encoder produces
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// GET /api/download/{name}
pub async fn download(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let name = validate_name(&name)?;
    tracing::debug!("Serving artifact: {}", name);

    let bytes = state.artifacts.get(name).await?;

    Ok((
        [
            (header::CONTENT_TYPE, VIDEO_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
