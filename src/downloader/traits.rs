// Backend trait definition and progress plumbing

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::errors::DownloadError;
use super::models::{DownloadProgress, DownloadRequest, MediaStream, PlaylistMetadata, VideoMetadata};

/// Trait for extraction backend implementations
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Check if this backend can run in the current environment
    async fn is_available(&self) -> bool;

    /// Resolve single-video metadata
    async fn video_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError>;

    /// Resolve a flat playlist listing
    async fn playlist_metadata(&self, _url: &str) -> Result<PlaylistMetadata, DownloadError> {
        Err(DownloadError::Unsupported(self.name()))
    }

    /// Open a byte stream for a single video
    async fn open_stream(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> Result<MediaStream, DownloadError>;

    /// Download a whole playlist into `dest_dir`, handing every stdout line to `on_line`
    async fn download_playlist(
        &self,
        _url: &str,
        _request: &DownloadRequest,
        _dest_dir: &Path,
        _on_line: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), DownloadError> {
        Err(DownloadError::Unsupported(self.name()))
    }
}

/// Progress emitter helper
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: mpsc::UnboundedSender<DownloadProgress>,
}

impl ProgressEmitter {
    pub fn new(tx: mpsc::UnboundedSender<DownloadProgress>) -> Self {
        Self { tx }
    }

    /// Emitter plus the receiving end, for callers that drain progress themselves
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DownloadProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, progress: DownloadProgress) {
        let _ = self.tx.send(progress);
    }
}
