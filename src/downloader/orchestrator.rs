// Extractor - primary/secondary strategy selection with fallback
//
// Strategy:
// 1. Metadata: primary if available, secondary on absence or failure
// 2. Playlist metadata: primary only; synthetic result when it is absent
// 3. Single download: stream from primary, secondary if primary cannot open one
// 4. Playlist download: primary only, no fallback

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::models::{
    DownloadProgress, DownloadRequest, MediaStream, PlaylistMetadata, VideoMetadata,
};
use super::progress::PlaylistProgressParser;
use super::traits::{MediaBackend, ProgressEmitter};
use super::utils::playlist_id;

/// Orchestrator owning the primary and secondary backends
#[derive(Clone)]
pub struct Extractor {
    primary: Arc<dyn MediaBackend>,
    secondary: Arc<dyn MediaBackend>,
}

impl Extractor {
    pub fn new(primary: Arc<dyn MediaBackend>, secondary: Arc<dyn MediaBackend>) -> Self {
        Self { primary, secondary }
    }

    /// Whether the primary capability can be used right now
    pub async fn check_capability(&self) -> bool {
        self.primary.is_available().await
    }

    pub async fn get_video_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        if self.check_capability().await {
            debug!(backend = self.primary.name(), url, "trying primary metadata strategy");
            match self.primary.video_metadata(url).await {
                Ok(info) => return Ok(info),
                Err(e) => {
                    warn!(backend = self.primary.name(), error = %e, "primary metadata failed, falling back");
                }
            }
        } else {
            info!(backend = self.primary.name(), "primary unavailable, using fallback metadata");
        }

        self.secondary.video_metadata(url).await.map_err(|e| {
            warn!(backend = self.secondary.name(), error = %e, "fallback metadata failed");
            match e {
                DownloadError::Extraction(_) => e,
                other => DownloadError::Extraction(other.to_string()),
            }
        })
    }

    pub async fn get_playlist_metadata(&self, url: &str) -> Result<PlaylistMetadata, DownloadError> {
        if !self.check_capability().await {
            info!(url, "primary unavailable, returning synthetic playlist info");
            let title = match playlist_id(url) {
                Some(id) => format!("Playlist {}", id),
                None => "Playlist".to_string(),
            };
            return Ok(PlaylistMetadata {
                title,
                video_count: 0,
                videos: Vec::new(),
                url: url.to_string(),
            });
        }

        self.primary.playlist_metadata(url).await.map_err(|e| match e {
            DownloadError::Extraction(_) => e,
            other => DownloadError::Extraction(other.to_string()),
        })
    }

    async fn open_stream(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> Result<MediaStream, DownloadError> {
        if self.check_capability().await {
            match self.primary.open_stream(url, request).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    warn!(backend = self.primary.name(), error = %e, "primary stream failed, falling back");
                }
            }
        }

        match self.secondary.open_stream(url, request).await {
            Ok(stream) => Ok(stream),
            Err(DownloadError::Unsupported(_)) => Err(DownloadError::capability_unavailable()),
            Err(e) => Err(e),
        }
    }

    /// Copy one video into `sink`, reporting byte-based progress when the
    /// total size is known. Returns the number of bytes written.
    pub async fn download_single<W>(
        &self,
        url: &str,
        request: &DownloadRequest,
        sink: &mut W,
        emitter: &ProgressEmitter,
    ) -> Result<u64, DownloadError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let MediaStream { total_bytes, mut chunks } = self.open_stream(url, request).await?;
        if total_bytes.is_none() {
            debug!(url, "total size unknown, no progress will be reported");
        }

        let mut written: u64 = 0;
        let mut last_percent: Option<u8> = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::Transport(format!("write failed: {}", e)))?;
            written += chunk.len() as u64;

            if let Some(progress) = total_bytes.and_then(|total| DownloadProgress::from_ratio(written, total)) {
                if last_percent != Some(progress.percent) {
                    last_percent = Some(progress.percent);
                    emitter.emit(progress);
                }
            }
        }

        sink.flush()
            .await
            .map_err(|e| DownloadError::Transport(format!("flush failed: {}", e)))?;
        Ok(written)
    }

    /// Download a playlist into `dest_dir`. Requires the primary capability.
    pub async fn download_playlist(
        &self,
        url: &str,
        request: &DownloadRequest,
        dest_dir: &Path,
        video_count: Option<usize>,
        emitter: &ProgressEmitter,
    ) -> Result<(), DownloadError> {
        if !self.check_capability().await {
            return Err(DownloadError::capability_unavailable());
        }

        tokio::fs::create_dir_all(dest_dir).await?;

        let mut parser = PlaylistProgressParser::new(video_count);
        let mut on_line = |line: &str| {
            debug!(line, "yt-dlp output");
            if let Some(percent) = parser.parse_line(line).and_then(|s| s.overall_percent()) {
                emitter.emit(DownloadProgress::from_percent(percent));
            }
        };

        self.primary
            .download_playlist(url, request, dest_dir, &mut on_line)
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::downloader::models::FormatSummary;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;

    /// Scriptable backend for orchestrator and worker tests
    #[derive(Clone, Default)]
    pub(crate) struct FakeBackend {
        pub available: bool,
        pub metadata: Option<VideoMetadata>,
        pub playlist: Option<PlaylistMetadata>,
        pub chunks: Option<Vec<Vec<u8>>>,
        pub known_size: bool,
        pub playlist_lines: Option<Vec<String>>,
    }

    pub(crate) fn sample_metadata(title: &str, with_formats: bool) -> VideoMetadata {
        VideoMetadata {
            title: title.to_string(),
            description: String::new(),
            duration_seconds: with_formats.then_some(60),
            author: "someone".to_string(),
            thumbnail_url: None,
            formats: if with_formats {
                vec![FormatSummary {
                    format_id: "18".into(),
                    quality: None,
                    ext: "mp4".into(),
                    resolution: None,
                    filesize: None,
                }]
            } else {
                Vec::new()
            },
            is_playlist: false,
        }
    }

    #[async_trait]
    impl MediaBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn video_metadata(&self, _url: &str) -> Result<VideoMetadata, DownloadError> {
            self.metadata
                .clone()
                .ok_or_else(|| DownloadError::Extraction("no metadata".into()))
        }

        async fn playlist_metadata(&self, _url: &str) -> Result<PlaylistMetadata, DownloadError> {
            self.playlist
                .clone()
                .ok_or_else(|| DownloadError::Extraction("no playlist".into()))
        }

        async fn open_stream(
            &self,
            _url: &str,
            _request: &DownloadRequest,
        ) -> Result<MediaStream, DownloadError> {
            let chunks = self
                .chunks
                .clone()
                .ok_or_else(|| DownloadError::Extraction("no stream".into()))?;
            let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
            Ok(MediaStream {
                total_bytes: self.known_size.then_some(total),
                chunks: stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed(),
            })
        }

        async fn download_playlist(
            &self,
            _url: &str,
            _request: &DownloadRequest,
            _dest_dir: &Path,
            on_line: &mut (dyn for<'a> FnMut(&'a str) + Send),
        ) -> Result<(), DownloadError> {
            let lines = self
                .playlist_lines
                .clone()
                .ok_or_else(|| DownloadError::Extraction("yt-dlp exited with code 1".into()))?;
            for line in &lines {
                on_line(line);
            }
            Ok(())
        }
    }

    fn extractor(primary: FakeBackend, secondary: FakeBackend) -> Extractor {
        Extractor::new(Arc::new(primary), Arc::new(secondary))
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<DownloadProgress>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(p) = rx.try_recv() {
            out.push(p.percent);
        }
        out
    }

    #[tokio::test]
    async fn test_metadata_prefers_primary() {
        let ex = extractor(
            FakeBackend { available: true, metadata: Some(sample_metadata("rich", true)), ..Default::default() },
            FakeBackend { available: true, metadata: Some(sample_metadata("plain", false)), ..Default::default() },
        );
        let meta = ex.get_video_metadata("https://youtu.be/abc").await.unwrap();
        assert_eq!(meta.title, "rich");
        assert_eq!(meta.formats.len(), 1);
    }

    #[tokio::test]
    async fn test_metadata_falls_back_when_primary_fails() {
        let ex = extractor(
            FakeBackend { available: true, metadata: None, ..Default::default() },
            FakeBackend { available: true, metadata: Some(sample_metadata("plain", false)), ..Default::default() },
        );
        let meta = ex.get_video_metadata("https://youtu.be/abc").await.unwrap();
        assert_eq!(meta.title, "plain");
        assert!(meta.formats.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_falls_back_when_primary_absent() {
        let ex = extractor(
            FakeBackend { available: false, metadata: Some(sample_metadata("rich", true)), ..Default::default() },
            FakeBackend { available: true, metadata: Some(sample_metadata("plain", false)), ..Default::default() },
        );
        assert_eq!(ex.get_video_metadata("https://youtu.be/abc").await.unwrap().title, "plain");
    }

    #[tokio::test]
    async fn test_metadata_error_when_both_fail() {
        let ex = extractor(
            FakeBackend { available: true, ..Default::default() },
            FakeBackend { available: true, ..Default::default() },
        );
        let err = ex.get_video_metadata("https://youtu.be/abc").await.unwrap_err();
        assert!(matches!(err, DownloadError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_playlist_metadata_soft_degrades() {
        let ex = extractor(FakeBackend::default(), FakeBackend { available: true, ..Default::default() });
        let meta = ex
            .get_playlist_metadata("https://www.youtube.com/playlist?list=PLxyz")
            .await
            .unwrap();
        assert_eq!(meta.title, "Playlist PLxyz");
        assert_eq!(meta.video_count, 0);
        assert!(meta.videos.is_empty());
    }

    #[tokio::test]
    async fn test_playlist_metadata_primary_failure_is_error() {
        let ex = extractor(FakeBackend { available: true, ..Default::default() }, FakeBackend::default());
        assert!(ex
            .get_playlist_metadata("https://www.youtube.com/playlist?list=PLxyz")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_download_single_reports_byte_progress() {
        let ex = extractor(
            FakeBackend {
                available: true,
                chunks: Some(vec![vec![1; 25], vec![2; 25], vec![3; 50]]),
                known_size: true,
                ..Default::default()
            },
            FakeBackend::default(),
        );
        let (emitter, mut rx) = ProgressEmitter::channel();
        let mut sink: Vec<u8> = Vec::new();
        let written = ex
            .download_single("https://youtu.be/abc", &DownloadRequest::default(), &mut sink, &emitter)
            .await
            .unwrap();
        assert_eq!(written, 100);
        assert_eq!(sink.len(), 100);
        assert_eq!(drain(&mut rx), vec![25, 50, 100]);
    }

    #[tokio::test]
    async fn test_download_single_without_size_is_silent() {
        let ex = extractor(
            FakeBackend { available: true, chunks: Some(vec![vec![0; 10]]), ..Default::default() },
            FakeBackend::default(),
        );
        let (emitter, mut rx) = ProgressEmitter::channel();
        let mut sink: Vec<u8> = Vec::new();
        ex.download_single("https://youtu.be/abc", &DownloadRequest::default(), &mut sink, &emitter)
            .await
            .unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_download_single_uses_secondary_stream() {
        let ex = extractor(
            FakeBackend { available: false, ..Default::default() },
            FakeBackend { available: true, chunks: Some(vec![vec![9; 4]]), ..Default::default() },
        );
        let (emitter, _rx) = ProgressEmitter::channel();
        let mut sink: Vec<u8> = Vec::new();
        let written = ex
            .download_single("https://cdn.example/clip.mp4", &DownloadRequest::default(), &mut sink, &emitter)
            .await
            .unwrap();
        assert_eq!(written, 4);
    }

    #[tokio::test]
    async fn test_playlist_download_requires_primary() {
        let ex = extractor(
            FakeBackend { available: false, playlist_lines: Some(Vec::new()), ..Default::default() },
            FakeBackend { available: true, ..Default::default() },
        );
        let (emitter, _rx) = ProgressEmitter::channel();
        let dir = tempfile::tempdir().unwrap();
        let err = ex
            .download_playlist(
                "https://www.youtube.com/playlist?list=PL1",
                &DownloadRequest::default(),
                dir.path(),
                Some(2),
                &emitter,
            )
            .await
            .unwrap_err();
        assert_eq!(err, DownloadError::capability_unavailable());
    }

    #[tokio::test]
    async fn test_playlist_download_emits_both_signals() {
        let lines = vec![
            "[download] Downloading item 1 of 2".to_string(),
            "[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01".to_string(),
            "[download] /tmp/b.mp4 has already been downloaded".to_string(),
        ];
        let ex = extractor(
            FakeBackend { available: true, playlist_lines: Some(lines), ..Default::default() },
            FakeBackend::default(),
        );
        let (emitter, mut rx) = ProgressEmitter::channel();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("playlist");
        ex.download_playlist(
            "https://www.youtube.com/playlist?list=PL1",
            &DownloadRequest::default(),
            &dest,
            Some(2),
            &emitter,
        )
        .await
        .unwrap();
        assert!(dest.is_dir());
        assert_eq!(drain(&mut rx), vec![25, 50]);
    }
}
