//! Download endpoints: buffered conversion, live streaming and size estimates.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use audiograb_core::{DeliveryMode, JobOutcome, Metadata, SizeEstimate, SubmitRequest};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a download
#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub url: Option<String>,
    /// Defaults to buffered.
    #[serde(default)]
    pub mode: DeliveryMode,
}

/// Query string carrying a source URL
#[derive(Debug, Deserialize)]
pub struct UrlParams {
    pub url: Option<String>,
}

/// Response for a completed buffered download
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub title: String,
    pub author: String,
    /// Where the artifact can be fetched.
    pub download_url: String,
    /// Suggested name for saving the file.
    pub file_name: String,
    pub size_bytes: u64,
}

/// Response for a metadata probe
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub title: String,
    pub author: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl From<Metadata> for InfoResponse {
    fn from(metadata: Metadata) -> Self {
        Self {
            size: metadata.display_size(),
            title: metadata.title,
            author: metadata.author,
            duration_secs: metadata.duration_secs,
        }
    }
}

fn required_url(url: Option<String>) -> Result<String, ApiError> {
    url.filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::validation("URL is required"))
}

// ============================================================================
// Handlers
// ============================================================================

/// Run a download. Buffered mode answers with JSON once the file is ready;
/// streamed mode answers with the audio itself.
pub async fn download(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(body): Json<DownloadBody>,
) -> Result<Response, ApiError> {
    let url = required_url(body.url)?;
    info!(user = %identity.user_id, mode = body.mode.as_str(), "Download requested");

    let request = SubmitRequest {
        source_url: url,
        mode: body.mode,
        requested_by: identity,
    };
    match state.coordinator().submit(request).await? {
        JobOutcome::Completed(result) => Ok(Json(DownloadResponse {
            success: true,
            job_id: result.job_id,
            title: result.title,
            author: result.author,
            download_url: result.artifact.public_url,
            file_name: result.artifact.file_name,
            size_bytes: result.artifact.size_bytes,
        })
        .into_response()),
        JobOutcome::Streaming(stream) => Ok(stream_response(stream)),
    }
}

/// Stream the converted audio as it is produced.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Query(params): Query<UrlParams>,
) -> Result<Response, ApiError> {
    let url = required_url(params.url)?;
    info!(user = %identity.user_id, "Stream requested");

    let stream = state.coordinator().submit_streamed(&url, identity)?;
    Ok(stream_response(stream))
}

/// Estimated size of the converted audio.
pub async fn size(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Result<Json<SizeEstimate>, ApiError> {
    let url = required_url(params.url)?;
    Ok(Json(state.coordinator().probe_size(&url).await?))
}

/// Title, author and size of a source without converting it.
pub async fn info(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Result<Json<InfoResponse>, ApiError> {
    let url = required_url(params.url)?;
    Ok(Json(state.coordinator().probe(&url).await?.into()))
}

/// Chunked audio body. Dropping the body (client gone) ends the job.
fn stream_response(stream: audiograb_core::DeliveryStream) -> Response {
    let content_type = HeaderValue::from_static(stream.content_type());
    let job_id = stream.job_id().to_string();

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(value) = HeaderValue::from_str(&job_id) {
        headers.insert("x-job-id", value);
    }
    response
}
