// HTTP API
//
// Routes:
//   GET    /api/video-info?url=      single-video metadata
//   GET    /api/playlist-info?url=   playlist metadata
//   POST   /api/download             enqueue a job
//   GET    /api/download/{id}        poll a job
//   GET    /api/downloads            list jobs
//   DELETE /api/download/{id}        cancel a job
//   GET    /api/health               liveness and yt-dlp availability

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use crate::downloader::utils::is_playlist_url;
use crate::downloader::{PlaylistMetadata, VideoMetadata};
use crate::jobs::{Job, JobError, JobRunner};

const DEFAULT_QUALITY: &str = "1080p";
const DEFAULT_FORMAT: &str = "mp4";

#[derive(Clone)]
pub struct AppState {
    pub runner: JobRunner,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/video-info", get(video_info))
        .route("/api/playlist-info", get(playlist_info))
        .route("/api/download", axum::routing::post(start_download))
        .route("/api/download/{id}", get(get_download).delete(cancel_download))
        .route("/api/downloads", get(list_downloads))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(_) => Self::not_found("Download not found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

impl UrlQuery {
    fn required_url(&self) -> ApiResult<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::bad_request("URL is required"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDownloadRequest {
    pub url: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub is_playlist: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDownloadResponse {
    pub download_id: String,
    pub message: &'static str,
    pub download: Job,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub yt_dlp: bool,
}

/// Formats end up as file extensions, so only short alphanumeric names pass
fn is_valid_format(format: &str) -> bool {
    !format.is_empty() && format.len() <= 8 && format.chars().all(|c| c.is_ascii_alphanumeric())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn video_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<VideoMetadata>> {
    let url = query.required_url()?;
    let meta = state
        .runner
        .extractor()
        .get_video_metadata(url)
        .await
        .map_err(|e| {
            error!(url, error = %e, "video info failed");
            ApiError::internal("Failed to get video info")
        })?;
    Ok(Json(meta))
}

pub async fn playlist_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<PlaylistMetadata>> {
    let url = query.required_url()?;
    if !is_playlist_url(url) {
        return Err(ApiError::bad_request("Not a playlist URL"));
    }
    let meta = state
        .runner
        .extractor()
        .get_playlist_metadata(url)
        .await
        .map_err(|e| {
            error!(url, error = %e, "playlist info failed");
            ApiError::internal("Failed to get playlist info")
        })?;
    Ok(Json(meta))
}

pub async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<StartDownloadRequest>, JsonRejection>,
) -> ApiResult<Json<StartDownloadResponse>> {
    let Json(payload) = payload.map_err(|rejection| {
        debug!(status = %rejection.status(), "rejected download request body");
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let url = non_blank(payload.url).ok_or_else(|| ApiError::bad_request("URL is required"))?;
    let quality = non_blank(payload.quality).unwrap_or_else(|| DEFAULT_QUALITY.to_string());
    let format = non_blank(payload.format)
        .map(|f| f.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
    if !is_valid_format(&format) {
        return Err(ApiError::bad_request("Invalid format"));
    }

    let job = state.runner.submit(&url, &quality, &format, payload.is_playlist.unwrap_or(false));
    info!(job_id = %job.id, "download started");
    Ok(Json(StartDownloadResponse {
        download_id: job.id.clone(),
        message: "Download started",
        download: job,
    }))
}

pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.runner.store().get_job(&id)?))
}

pub async fn list_downloads(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.runner.store().list_jobs())
}

pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.runner.store().cancel_job(&id)?;
    Ok(Json(MessageResponse {
        message: "Download cancelled",
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        yt_dlp: state.runner.extractor().check_capability().await,
    })
}
