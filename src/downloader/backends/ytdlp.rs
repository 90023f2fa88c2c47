// yt-dlp backend - the primary, richer capability
//
// Needs the `yt-dlp` executable. Provides full metadata with format lists,
// flat playlist listings, single-video byte streams (yt-dlp writes the media
// to stdout) and whole-playlist downloads into a directory.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{future, stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command as TokioCommand};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{
    DownloadRequest, FormatSummary, MediaStream, PlaylistEntry, PlaylistMetadata, VideoMetadata,
};
use crate::downloader::traits::MediaBackend;
use crate::downloader::utils::{is_playlist_url, run_output_with_timeout, spawn_error};

/// Backend driving the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    ytdlp_path: String,
    timeout_secs: u64,
}

impl YtDlpBackend {
    pub fn new(ytdlp_path: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            timeout_secs,
        }
    }

    /// Format selector for output that must be a single file (no merging),
    /// e.g. when streaming to stdout
    fn single_file_selector(request: &DownloadRequest) -> String {
        if request.is_audio() {
            return "bestaudio[ext=m4a]/bestaudio/best".to_string();
        }
        match request.max_height() {
            Some(h) => format!(
                "best[height<={h}][ext={ext}]/best[height<={h}]/best",
                h = h,
                ext = request.format
            ),
            None => format!("best[ext={}]/best", request.format),
        }
    }

    /// Format selector for playlist downloads, where yt-dlp may merge streams
    fn playlist_selector(request: &DownloadRequest) -> String {
        if request.is_audio() {
            return "bestaudio[ext=m4a]/bestaudio".to_string();
        }
        match request.max_height() {
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]", h = h),
            None => "bestvideo+bestaudio/best".to_string(),
        }
    }

    fn playlist_args(&self, url: &str, request: &DownloadRequest, dest_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--no-warnings".to_string(),
            "--yes-playlist".to_string(),
            "-o".to_string(),
            dest_dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned(),
            "-f".to_string(),
            Self::playlist_selector(request),
        ];

        if request.is_audio() {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                request.format.clone(),
                "--audio-quality".to_string(),
                "0".to_string(),
            ]);
        } else if matches!(request.format.as_str(), "mp4" | "webm" | "mkv") {
            args.push("--merge-output-format".to_string());
            args.push(request.format.clone());
        }

        args.extend([
            "--write-thumbnail".to_string(),
            "--write-description".to_string(),
            "--write-info-json".to_string(),
            "--no-playlist-metafiles".to_string(),
            url.to_string(),
        ]);
        args
    }

    async fn dump_json(&self, args: Vec<String>) -> Result<Vec<u8>, DownloadError> {
        debug!(cmd = %self.ytdlp_path, args = %args.join(" "), "running yt-dlp");
        let output = run_output_with_timeout(&self.ytdlp_path, args, self.timeout_secs).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.is_empty() {
                return Err(DownloadError::Extraction(format!("yt-dlp exited with {}", output.status)));
            }
            return Err(DownloadError::from(stderr));
        }
        Ok(output.stdout)
    }

    /// Best-effort size of the format yt-dlp would pick
    async fn query_size(&self, url: &str, selector: &str) -> Option<u64> {
        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            selector.to_string(),
            url.to_string(),
        ];
        match self.dump_json(args).await {
            Ok(stdout) => parse_requested_size(&stdout),
            Err(e) => {
                debug!(error = %e, "size lookup failed; progress will not be reported");
                None
            }
        }
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn is_available(&self) -> bool {
        match run_output_with_timeout(&self.ytdlp_path, vec!["--version".to_string()], 10).await {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    async fn video_metadata(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        let stdout = self
            .dump_json(vec![
                "--dump-json".to_string(),
                "--no-playlist".to_string(),
                "--no-warnings".to_string(),
                url.to_string(),
            ])
            .await?;
        parse_video_info(&stdout, url)
    }

    async fn playlist_metadata(&self, url: &str) -> Result<PlaylistMetadata, DownloadError> {
        let stdout = self
            .dump_json(vec![
                "--dump-json".to_string(),
                "--flat-playlist".to_string(),
                "--no-warnings".to_string(),
                url.to_string(),
            ])
            .await?;
        parse_flat_playlist(&stdout, url)
    }

    async fn open_stream(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> Result<MediaStream, DownloadError> {
        let selector = Self::single_file_selector(request);
        let total_bytes = self.query_size(url, &selector).await;

        let args = vec![
            "-f".to_string(),
            selector,
            "--no-playlist".to_string(),
            "--no-part".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            "-".to_string(),
            url.to_string(),
        ];
        info!(url, "starting yt-dlp stream");

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ytdlp_path, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Execution("Failed to capture yt-dlp stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Execution("Failed to capture yt-dlp stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).trim().to_string()
        });

        let body = ReaderStream::new(stdout).map(|chunk| chunk.map_err(DownloadError::from));

        // Surfaces a non-zero exit as the final item, so a truncated stream is
        // never mistaken for a complete one.
        let exit = stream::once(wait_for_exit(child, stderr_task)).filter_map(future::ready);

        Ok(MediaStream {
            total_bytes,
            chunks: body.chain(exit).boxed(),
        })
    }

    async fn download_playlist(
        &self,
        url: &str,
        request: &DownloadRequest,
        dest_dir: &Path,
        on_line: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), DownloadError> {
        let args = self.playlist_args(url, request, dest_dir);
        info!(url, dir = %dest_dir.display(), "starting yt-dlp playlist download");

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ytdlp_path, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Execution("Failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Execution("Failed to capture yt-dlp stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(line = %line, "yt-dlp stderr");
                collected.push(line);
            }
            collected.join("\n")
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            on_line(&line);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::Execution(format!("Process error: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        warn!(%status, "yt-dlp playlist download failed");
        match status.code() {
            Some(code) if stderr_output.is_empty() => Err(DownloadError::Extraction(format!(
                "yt-dlp exited with code {}",
                code
            ))),
            _ => Err(DownloadError::from(stderr_output)),
        }
    }
}

async fn wait_for_exit(
    mut child: Child,
    stderr_task: JoinHandle<String>,
) -> Option<Result<Bytes, DownloadError>> {
    let status = match child.wait().await {
        Ok(status) => status,
        Err(e) => return Some(Err(DownloadError::Execution(e.to_string()))),
    };
    let stderr = stderr_task.await.unwrap_or_default();
    if status.success() {
        None
    } else if stderr.is_empty() {
        Some(Err(DownloadError::Extraction(format!("yt-dlp exited with {}", status))))
    } else {
        Some(Err(DownloadError::from(stderr)))
    }
}

/// Parse `--dump-json` output of a single video
fn parse_video_info(stdout: &[u8], url: &str) -> Result<VideoMetadata, DownloadError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::Parse(format!("Invalid JSON: {}", e)))?;

    let formats = json["formats"]
        .as_array()
        .map(|formats| {
            formats
                .iter()
                .map(|f| FormatSummary {
                    format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                    quality: f["quality"].as_f64(),
                    ext: f["ext"].as_str().unwrap_or("").to_string(),
                    resolution: f["resolution"].as_str().map(str::to_string),
                    filesize: f["filesize"].as_u64(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(VideoMetadata {
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        description: json["description"].as_str().unwrap_or("").to_string(),
        duration_seconds: json["duration"].as_f64().map(|d| d.max(0.0) as u64),
        author: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
        thumbnail_url: json["thumbnail"].as_str().map(str::to_string),
        formats,
        is_playlist: is_playlist_url(url),
    })
}

/// Parse `--flat-playlist --dump-json` output: one JSON object per line
fn parse_flat_playlist(stdout: &[u8], url: &str) -> Result<PlaylistMetadata, DownloadError> {
    let text = String::from_utf8_lossy(stdout);
    let mut videos = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let entry: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| DownloadError::Parse(format!("Failed to parse playlist info: {}", e)))?;

        let thumbnail_url = entry["thumbnail"]
            .as_str()
            .or_else(|| {
                entry["thumbnails"]
                    .as_array()
                    .and_then(|t| t.last())
                    .and_then(|t| t["url"].as_str())
            })
            .map(str::to_string);

        videos.push(PlaylistEntry {
            id: entry["id"].as_str().unwrap_or("").to_string(),
            title: entry["title"].as_str().unwrap_or("").to_string(),
            duration_seconds: entry["duration"].as_f64().map(|d| d.max(0.0) as u64),
            thumbnail_url,
            url: entry["url"]
                .as_str()
                .or_else(|| entry["webpage_url"].as_str())
                .unwrap_or("")
                .to_string(),
        });
    }

    Ok(PlaylistMetadata::from_entries(url, videos))
}

fn parse_requested_size(stdout: &[u8]) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_slice(stdout).ok()?;
    json["filesize"]
        .as_u64()
        .or_else(|| json["filesize_approx"].as_u64())
        .or_else(|| json["filesize_approx"].as_f64().map(|f| f as u64))
        .filter(|&size| size > 0)
}
