// Common data models for extraction backends

use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// Video information returned by `/api/video-info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    /// Length in seconds, `None` when the backend cannot tell
    #[serde(rename = "duration")]
    pub duration_seconds: Option<u64>,
    pub author: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
    /// Empty for the reduced-fidelity backend
    pub formats: Vec<FormatSummary>,
    pub is_playlist: bool,
}

/// Format details as reported by yt-dlp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSummary {
    pub format_id: String,
    pub quality: Option<f64>,
    pub ext: String,
    pub resolution: Option<String>,
    pub filesize: Option<u64>,
}

/// One entry of a flat playlist listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "duration")]
    pub duration_seconds: Option<u64>,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
    pub url: String,
}

/// Playlist information returned by `/api/playlist-info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMetadata {
    pub title: String,
    pub video_count: usize,
    pub videos: Vec<PlaylistEntry>,
    pub url: String,
}

impl PlaylistMetadata {
    pub fn from_entries(url: &str, videos: Vec<PlaylistEntry>) -> Self {
        Self {
            title: playlist_title(videos.len()),
            video_count: videos.len(),
            videos,
            url: url.to_string(),
        }
    }
}

pub fn playlist_title(video_count: usize) -> String {
    format!("Playlist ({} videos)", video_count)
}

/// Requested output, as submitted with a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// e.g. "1080p", "720p", "best"
    pub quality: String,
    /// Container or audio format, e.g. "mp4", "webm", "mp3"
    pub format: String,
}

impl DownloadRequest {
    pub fn new(quality: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            quality: quality.into(),
            format: format.into(),
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.format.as_str(), "mp3" | "m4a" | "opus" | "wav" | "aac") || self.quality == "audio"
    }

    /// Height limit parsed from "1080p"-style quality strings
    pub fn max_height(&self) -> Option<u32> {
        self.quality.strip_suffix('p').and_then(|h| h.parse().ok())
    }
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self::new("1080p", "mp4")
    }
}

/// A byte stream opened by a backend
pub struct MediaStream {
    /// Total size in bytes when the backend knows it up front
    pub total_bytes: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes, DownloadError>>,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

/// Download progress information
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// 0..=100
    pub percent: u8,
}

impl DownloadProgress {
    pub fn from_ratio(done: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        let percent = ((done as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8;
        Some(Self { percent })
    }

    pub fn from_percent(percent: f32) -> Self {
        Self {
            percent: percent.round().clamp(0.0, 100.0) as u8,
        }
    }
}
