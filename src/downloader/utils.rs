// Helper functions shared by backends and request handlers

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use super::errors::DownloadError;

/// Longest file stem produced by [`sanitize_filename`]
pub const MAX_FILENAME_CHARS: usize = 200;
/// Byte cap for the stem; filesystems limit names to 255 bytes and the
/// extension still has to fit
pub const MAX_FILENAME_BYTES: usize = 240;

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Execution(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Execution(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| DownloadError::Execution(format!("Failed to wait for {}: {}", program, e)))?;
            let stdout = join_pipe(stdout_task, "stdout").await?;
            let stderr = join_pipe(stderr_task, "stderr").await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::Timeout(timeout_secs))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::Execution(format!("{} task failed: {}", name, e)))?
        .map_err(|e| DownloadError::Execution(format!("Failed to read {}: {}", name, e)))
}

pub fn spawn_error(program: &str, err: std::io::Error) -> DownloadError {
    if err.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.to_string())
    } else {
        DownloadError::Execution(format!("Failed to start {}: {}", program, err))
    }
}

/// Find yt-dlp executable in common install locations
pub fn find_ytdlp() -> String {
    let mut candidates: Vec<PathBuf> = vec![
        PathBuf::from("/opt/homebrew/bin/yt-dlp"), // Homebrew on Apple Silicon
        PathBuf::from("/usr/local/bin/yt-dlp"),    // Homebrew on Intel Mac, manual installs
        PathBuf::from("/usr/bin/yt-dlp"),          // System package
    ];
    // pip install --user
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local").join("bin").join("yt-dlp"));
    }

    for path in candidates {
        if path.exists() {
            debug!(path = %path.display(), "found yt-dlp");
            return path.to_string_lossy().into_owned();
        }
    }

    // Last resort: hope it's in PATH
    "yt-dlp".to_string()
}

/// Make a remote title safe to use as a file stem.
///
/// Strips characters that are illegal in paths on common filesystems,
/// collapses whitespace runs into a single `_` and caps the length at
/// [`MAX_FILENAME_CHARS`] characters and [`MAX_FILENAME_BYTES`] bytes.
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;

    for c in title.chars() {
        if is_forbidden(c) {
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push('_');
            pending_space = false;
        }
        out.push(c);
    }
    if pending_space {
        out.push('_');
    }

    let mut truncated = String::with_capacity(out.len().min(MAX_FILENAME_BYTES));
    for c in out.chars().take(MAX_FILENAME_CHARS) {
        if truncated.len() + c.len_utf8() > MAX_FILENAME_BYTES {
            break;
        }
        truncated.push(c);
    }
    match truncated.as_str() {
        "" | "." | ".." => "download".to_string(),
        _ => truncated,
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || (c.is_control() && !c.is_whitespace())
}

/// Whether a URL points at a playlist rather than a single video
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("playlist") || playlist_id(url).is_some()
}

/// Whether the URL's host is YouTube
pub fn is_youtube_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
    host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Value of the `list=` query parameter, if any
pub fn playlist_id(url: &str) -> Option<&str> {
    let query = url.split_once('?')?.1;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("list="))
        .map(|id| id.split('#').next().unwrap_or(id))
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_illegal_characters() {
        let name = sanitize_filename(r#"My/Video: "Test"?"#);
        assert_eq!(name, "MyVideo_Test");
        for c in ['/', '\\', ':', '"', '?', '*', '<', '>', '|'] {
            assert!(!name.contains(c));
        }
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_filename("a   b\t\tc \n d"), "a_b_c_d");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let name = sanitize_filename(&"a".repeat(500));
        assert_eq!(name.chars().count(), MAX_FILENAME_CHARS);

        let name = sanitize_filename(&"é".repeat(500));
        assert_eq!(name.len(), MAX_FILENAME_BYTES);
        assert_eq!(name.chars().count(), MAX_FILENAME_BYTES / 2);
    }

    #[test]
    fn test_sanitized_multibyte_title_is_creatable() {
        let title = "日本語のとても長い動画タイトル".repeat(11);
        assert!(title.chars().count() > 160);

        let stem = sanitize_filename(&title);
        assert!(stem.len() <= MAX_FILENAME_BYTES);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.webm", stem));
        std::fs::File::create(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_sanitize_never_empty() {
        assert_eq!(sanitize_filename("???"), "download");
        assert_eq!(sanitize_filename(""), "download");
    }

    #[test]
    fn test_playlist_detection() {
        assert!(is_playlist_url("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist_url("https://www.youtube.com/watch?v=abc&list=PL123"));
        assert!(!is_playlist_url("https://youtu.be/abc"));
        assert_eq!(playlist_id("https://www.youtube.com/playlist?list=PL123&index=2"), Some("PL123"));
        assert_eq!(playlist_id("https://www.youtube.com/watch?v=abc"), None);
    }

    #[test]
    fn test_youtube_host_detection() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_youtube_url("https://youtu.be/abc"));
        assert!(is_youtube_url("http://m.youtube.com/watch?v=abc"));
        assert!(!is_youtube_url("https://cdn.example.com/youtube.com/clip.mp4"));
        assert!(!is_youtube_url("http://127.0.0.1:8080/clip.mp4"));
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let err = run_output_with_timeout("definitely-not-a-real-binary-xyz", Vec::new(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
