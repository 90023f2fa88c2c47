// Plain HTTP backend - fallback layer under the native YouTube backend
//
// Only needs network access. Metadata comes from YouTube's oEmbed endpoint
// (title, author, thumbnail; no description, duration or formats). Byte
// streams are plain HTTP GETs and only work for URLs that point straight at
// a media file.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{DownloadRequest, MediaStream, VideoMetadata};
use crate::downloader::traits::MediaBackend;
use crate::downloader::utils::is_playlist_url;

pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    author_name: Option<String>,
    thumbnail_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OEmbedBackend {
    client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
}

impl OEmbedBackend {
    pub fn new(request_timeout: Duration) -> Result<Self, DownloadError> {
        Self::with_endpoint(DEFAULT_OEMBED_ENDPOINT, request_timeout)
    }

    /// Point metadata lookups at a different oEmbed endpoint
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        // No overall timeout on the client: media streams may run for a long time
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DownloadError::Execution(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_timeout,
        })
    }
}

#[async_trait]
impl MediaBackend for OEmbedBackend {
    fn name(&self) -> &'static str {
        "oembed"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn video_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        debug!(endpoint = %self.endpoint, url, "oEmbed lookup");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url), ("format", "json")])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| DownloadError::Extraction(format!("oEmbed request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Extraction(format!("oEmbed returned {}", status)));
        }

        let body: OEmbedResponse = response
            .json()
            .await
            .map_err(|e| DownloadError::Parse(format!("Invalid oEmbed response: {}", e)))?;

        Ok(VideoMetadata {
            title: body.title.unwrap_or_default(),
            description: String::new(),
            duration_seconds: None,
            author: body.author_name.unwrap_or_default(),
            thumbnail_url: body.thumbnail_url,
            formats: Vec::new(),
            is_playlist: is_playlist_url(url),
        })
    }

    async fn open_stream(
        &self,
        url: &str,
        _request: &DownloadRequest,
    ) -> Result<MediaStream, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Extraction(format!("{} returned {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if content_type.starts_with("text/") || content_type.contains("json") {
            return Err(DownloadError::Extraction(format!(
                "no direct media stream at {} ({})",
                url, content_type
            )));
        }

        let total_bytes = response.content_length().filter(|&len| len > 0);
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| DownloadError::Transport(e.to_string())))
            .boxed();

        Ok(MediaStream { total_bytes, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OEmbedBackend {
        OEmbedBackend::with_endpoint(format!("{}/oembed", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_metadata_from_oembed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .and(query_param("url", "https://youtu.be/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "A video",
                "author_name": "Someone",
                "thumbnail_url": "https://i.ytimg.com/vi/abc/hqdefault.jpg"
            })))
            .mount(&server)
            .await;

        let meta = backend(&server).video_metadata("https://youtu.be/abc").await.unwrap();
        assert_eq!(meta.title, "A video");
        assert_eq!(meta.author, "Someone");
        assert_eq!(meta.duration_seconds, None);
        assert!(meta.formats.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = backend(&server).video_metadata("https://youtu.be/gone").await.unwrap_err();
        assert!(matches!(err, DownloadError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_stream_direct_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8; 2048], "video/mp4"))
            .mount(&server)
            .await;

        let url = format!("{}/clip.mp4", server.uri());
        let stream = backend(&server)
            .open_stream(&url, &DownloadRequest::default())
            .await
            .unwrap();
        assert_eq!(stream.total_bytes, Some(2048));

        let chunks: Vec<_> = stream.chunks.collect().await;
        let total: usize = chunks.into_iter().map(|c| c.unwrap().len()).sum();
        assert_eq!(total, 2048);
    }

    #[tokio::test]
    async fn test_stream_rejects_html_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let url = format!("{}/watch", server.uri());
        let err = backend(&server)
            .open_stream(&url, &DownloadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Extraction(_)));
    }
}
