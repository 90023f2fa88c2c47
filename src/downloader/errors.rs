// Error types for extraction backends and downloads

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    /// Missing or malformed input (empty URL, non-playlist URL, ...)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Neither backend could resolve the media, or a required capability is absent
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Writing to the output sink or reading the media stream failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// yt-dlp not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// External process did not answer in time
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Failed to parse yt-dlp or oEmbed JSON output
    #[error("Parse error: {0}")]
    Parse(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// The backend does not implement this operation
    #[error("Unsupported by {0}")]
    Unsupported(&'static str),
}

impl DownloadError {
    /// Shortcut used whenever the primary capability is required but missing
    pub fn capability_unavailable() -> Self {
        Self::Extraction("capability unavailable".to_string())
    }
}

// Classify raw stderr from yt-dlp into a typed error
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("unsupported url") || lower.contains("invalid url") || lower.contains("is not a valid url") {
            return Self::Validation(s);
        }

        if lower.contains("json") && (lower.contains("parse") || lower.contains("decode")) {
            return Self::Parse(s);
        }

        if lower.contains("unable to write") || lower.contains("broken pipe") || lower.contains("no space left") {
            return Self::Transport(s);
        }

        Self::Extraction(s)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_classification() {
        assert_eq!(
            DownloadError::from("ERROR: Unsupported URL: https://example.com".to_string()),
            DownloadError::Validation("ERROR: Unsupported URL: https://example.com".to_string())
        );
        assert!(matches!(
            DownloadError::from("ERROR: [youtube] abc: Video unavailable".to_string()),
            DownloadError::Extraction(_)
        ));
        assert!(matches!(
            DownloadError::from("yt-dlp: command not found".to_string()),
            DownloadError::ToolNotFound(_)
        ));
        assert!(matches!(
            DownloadError::from("ERROR: unable to write data: No space left on device".to_string()),
            DownloadError::Transport(_)
        ));
    }

    #[test]
    fn test_missing_output_path_is_not_missing_tool() {
        let err = DownloadError::from(
            "ERROR: unable to open for writing: [Errno 2] No such file or directory: 'out/x.mp4'".to_string(),
        );
        assert!(matches!(err, DownloadError::Extraction(_)));
    }

    #[test]
    fn test_capability_message() {
        assert_eq!(
            DownloadError::capability_unavailable().to_string(),
            "Extraction failed: capability unavailable"
        );
    }
}
