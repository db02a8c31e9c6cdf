//! HTTP handlers.
//!
//! Request parsing and response shaping only; orchestration, state and
//! cleanup live behind the engine façade.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::info;

use plpack_media::fetch_playlist_info;
use plpack_models::{DownloadOptions, JobId, JobSnapshot, MediaFormat, PlaylistEntry, Quality};

use crate::error::{ApiError, ApiResult};
use crate::session::ClientSession;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoadPlaylistRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct LoadPlaylistResponse {
    pub playlist_title: String,
    pub entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub url: String,
    #[serde(default)]
    pub format: MediaFormat,
    #[serde(default)]
    pub quality: Quality,
    pub indices: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub jobs: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        jobs: state.engine.job_count().await,
    })
}

/// POST /api/playlist
///
/// Load playlist metadata for a URL and cache it for this session; job
/// creation validates its selection against this cache.
pub async fn load_playlist(
    State(state): State<AppState>,
    session: ClientSession,
    Json(request): Json<LoadPlaylistRequest>,
) -> ApiResult<Json<LoadPlaylistResponse>> {
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::bad_request("No URL provided"));
    }

    let playlist = fetch_playlist_info(&url).await?;

    state
        .playlists
        .store(session.owner.clone(), url, playlist.clone())
        .await;

    Ok(Json(LoadPlaylistResponse {
        playlist_title: playlist.title,
        entries: playlist.entries,
    }))
}

/// POST /api/jobs
///
/// Start a download job for a selection of the previously loaded playlist.
pub async fn create_job(
    State(state): State<AppState>,
    session: ClientSession,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<Json<CreateJobResponse>> {
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::bad_request("No playlist URL provided"));
    }
    if request.indices.is_empty() {
        return Err(ApiError::bad_request("No items selected"));
    }

    let (playlist_title, selection) = state
        .playlists
        .resolve(&session.owner, &url, &request.indices)
        .await?;

    let job_id = state
        .engine
        .create_job(
            session.owner,
            url,
            playlist_title,
            selection,
            DownloadOptions {
                format: request.format,
                quality: request.quality,
            },
        )
        .await?;

    Ok(Json(CreateJobResponse { job_id }))
}

/// GET /api/jobs/:job_id/progress
///
/// Poll a job's progress snapshot. Refreshes the job's idle clock.
pub async fn get_job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    _session: ClientSession,
) -> ApiResult<Json<JobSnapshot>> {
    let snapshot = state.engine.progress(&JobId::from_string(job_id)).await?;
    Ok(Json(snapshot))
}

/// GET /api/jobs/:job_id/archive
///
/// Stream the assembled archive of a finished job.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    _session: ClientSession,
) -> ApiResult<Response> {
    let download = state.engine.archive(&JobId::from_string(job_id)).await?;

    let file = tokio::fs::File::open(&download.path)
        .await
        .map_err(|e| ApiError::internal(format!("Cannot open archive: {}", e)))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Cannot stat archive: {}", e)))?
        .len();

    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.file_name),
        )
        .body(body)
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// DELETE /api/session
///
/// Session teardown: drop the cached playlist and evict every job owned by
/// this session. Fire-and-forget; the client is not kept waiting while
/// running jobs wind down.
pub async fn end_session(
    State(state): State<AppState>,
    session: ClientSession,
) -> axum::http::StatusCode {
    state.playlists.forget(&session.owner).await;

    let engine = state.engine;
    let owner = session.owner;
    tokio::spawn(async move {
        let evicted = engine.evict_owner(&owner).await;
        info!(owner = %owner, evicted, "Session teardown complete");
    });

    axum::http::StatusCode::ACCEPTED
}
