// Downloader module - extraction adapter over yt-dlp and a plain HTTP fallback

pub mod backends;
pub mod diagnostics;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod traits;
pub mod utils;

pub use errors::DownloadError;
pub use models::{
    DownloadProgress, DownloadRequest, MediaStream, PlaylistEntry, PlaylistMetadata, VideoMetadata,
};
pub use orchestrator::Extractor;
pub use traits::{MediaBackend, ProgressEmitter};
