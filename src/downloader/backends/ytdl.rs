// Native YouTube backend - the secondary capability
//
// Needs nothing but network access. YouTube URLs are resolved and streamed
// in-process with rusty_ytdl (muxed formats only, so the result is a single
// file). Anything else, and any metadata rusty_ytdl cannot resolve, goes
// through the plain HTTP/oEmbed backend.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use rusty_ytdl::stream::Stream as YtdlStream;
use rusty_ytdl::{Video, VideoOptions, VideoQuality, VideoSearchOptions};
use tracing::{debug, info, warn};

use super::oembed::OEmbedBackend;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{DownloadRequest, MediaStream, VideoMetadata};
use crate::downloader::traits::MediaBackend;
use crate::downloader::utils::{is_playlist_url, is_youtube_url};

#[derive(Debug, Clone)]
pub struct YtdlBackend {
    http: OEmbedBackend,
    request_timeout: Duration,
}

impl YtdlBackend {
    pub fn new(http: OEmbedBackend, request_timeout: Duration) -> Self {
        Self { http, request_timeout }
    }

    fn options(request: &DownloadRequest) -> VideoOptions {
        if request.is_audio() {
            VideoOptions {
                quality: VideoQuality::HighestAudio,
                filter: VideoSearchOptions::Audio,
                ..Default::default()
            }
        } else {
            VideoOptions {
                quality: VideoQuality::Highest,
                filter: VideoSearchOptions::VideoAudio,
                ..Default::default()
            }
        }
    }

    async fn youtube_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        let video = Video::new(url).map_err(|e| DownloadError::Validation(e.to_string()))?;
        let info = tokio::time::timeout(self.request_timeout, video.get_info())
            .await
            .map_err(|_| DownloadError::Timeout(self.request_timeout.as_secs()))?
            .map_err(|e| DownloadError::Extraction(e.to_string()))?;

        let details = info.video_details;
        Ok(VideoMetadata {
            title: details.title,
            description: details.description,
            duration_seconds: details.length_seconds.parse().ok(),
            author: details.author.map(|a| a.name).unwrap_or_default(),
            thumbnail_url: details.thumbnails.last().map(|t| t.url.clone()),
            formats: Vec::new(),
            is_playlist: is_playlist_url(url),
        })
    }

    async fn youtube_stream(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> Result<MediaStream, DownloadError> {
        let video = Video::new_with_options(url, Self::options(request))
            .map_err(|e| DownloadError::Validation(e.to_string()))?;
        let source = tokio::time::timeout(self.request_timeout, video.stream())
            .await
            .map_err(|_| DownloadError::Timeout(self.request_timeout.as_secs()))?
            .map_err(|e| DownloadError::Extraction(e.to_string()))?;

        let total = source.content_length() as u64;
        info!(url, total, "streaming with rusty_ytdl");
        Ok(MediaStream {
            total_bytes: (total > 0).then_some(total),
            chunks: into_chunks(source),
        })
    }
}

/// Pull chunks until the source ends or fails; a failure ends the stream
fn into_chunks(
    source: Box<dyn YtdlStream + Send + Sync>,
) -> BoxStream<'static, Result<bytes::Bytes, DownloadError>> {
    futures_util::stream::unfold(Some(source), |state| async move {
        let source = match state {
            Some(source) => source,
            None => return None,
        };
        match source.chunk().await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(source))),
            Ok(None) => None,
            Err(e) => Some((Err(DownloadError::Transport(e.to_string())), None)),
        }
    })
    .boxed()
}

#[async_trait]
impl MediaBackend for YtdlBackend {
    fn name(&self) -> &'static str {
        "rusty_ytdl"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn video_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        if is_youtube_url(url) {
            match self.youtube_metadata(url).await {
                Ok(meta) => return Ok(meta),
                Err(e) => warn!(url, error = %e, "rusty_ytdl metadata failed, trying oEmbed"),
            }
        }
        self.http.video_metadata(url).await
    }

    async fn open_stream(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> Result<MediaStream, DownloadError> {
        if is_youtube_url(url) {
            return self.youtube_stream(url, request).await;
        }
        debug!(url, "not a YouTube URL, using plain HTTP");
        self.http.open_stream(url, request).await
    }
}
