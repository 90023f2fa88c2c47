// Failure diagnostics - turns raw yt-dlp stderr into a short reason
//
// Job records carry a human-readable `error`. yt-dlp's stderr is long and
// noisy, so the worker stores a one-line reason followed by the first
// relevant line of the original output.

use super::errors::DownloadError;

/// Known reasons why YouTube refuses a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// DRM / Premium / paid content, no workaround
    DrmProtected,
    MembersOnly,
    AgeRestricted,
    PrivateVideo,
    VideoUnavailable,
    GeoBlocked,
    /// HTTP 429 or similar
    RateLimited,
    BotDetection,
    /// HTTP 403 Forbidden
    Forbidden,
    NetworkTimeout,
}

impl FailureReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "Members-only content",
            Self::AgeRestricted => "Age-restricted content",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::GeoBlocked => "Not available in this region",
            Self::RateLimited => "Rate limited by YouTube",
            Self::BotDetection => "Bot detection triggered",
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::NetworkTimeout => "Network timeout",
        }
    }
}

/// Analyze error text and return the most specific reason
pub fn diagnose_error(error: &str) -> Option<FailureReason> {
    let lower = error.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    // Order matters: most specific first
    if any(&["drm", "widevine", "youtube premium", "requires purchase", "rental"]) {
        return Some(FailureReason::DrmProtected);
    }
    if any(&["members only", "members-only", "join this channel", "available to members"]) {
        return Some(FailureReason::MembersOnly);
    }
    if any(&["age-restricted", "sign in to confirm your age"]) {
        return Some(FailureReason::AgeRestricted);
    }
    if any(&["private video", "video is private"]) {
        return Some(FailureReason::PrivateVideo);
    }
    if any(&["video unavailable", "video has been removed", "no longer available"]) {
        return Some(FailureReason::VideoUnavailable);
    }
    if any(&["not available in your country", "blocked in your country"]) {
        return Some(FailureReason::GeoBlocked);
    }
    if any(&["429", "too many requests", "rate limit"]) {
        return Some(FailureReason::RateLimited);
    }
    if any(&["confirm you're not a bot", "captcha", "unusual traffic"]) {
        return Some(FailureReason::BotDetection);
    }
    if any(&["403", "forbidden"]) {
        return Some(FailureReason::Forbidden);
    }
    if any(&["timed out", "timeout", "connection refused", "network is unreachable"]) {
        return Some(FailureReason::NetworkTimeout);
    }
    None
}

/// First line that looks like the actual error, trimmed to a sane length
fn headline(error: &str) -> Option<String> {
    let lines = || error.lines().map(str::trim).filter(|l| !l.is_empty());
    lines()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines().last())
        .map(|l| l.chars().take(300).collect())
}

/// Message stored on a failed job
pub fn describe_failure(err: &DownloadError) -> String {
    let raw = err.to_string();
    match (diagnose_error(&raw), headline(&raw)) {
        (Some(reason), Some(line)) => format!("{}: {}", reason.description(), line),
        (Some(reason), None) => reason.description().to_string(),
        (None, Some(line)) => line,
        (None, None) => "Download failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_403_detection() {
        assert_eq!(diagnose_error("ERROR: HTTP Error 403: Forbidden"), Some(FailureReason::Forbidden));
    }

    #[test]
    fn test_age_restricted_detection() {
        assert_eq!(diagnose_error("Sign in to confirm your age"), Some(FailureReason::AgeRestricted));
    }

    #[test]
    fn test_drm_detection() {
        assert_eq!(diagnose_error("This video is DRM protected"), Some(FailureReason::DrmProtected));
    }

    #[test]
    fn test_timeout_detection() {
        assert_eq!(diagnose_error("Timed out after 30s"), Some(FailureReason::NetworkTimeout));
    }

    #[test]
    fn test_unknown_text() {
        assert_eq!(diagnose_error("something odd happened"), None);
    }

    #[test]
    fn test_describe_failure_prefers_error_line() {
        let err = DownloadError::Extraction(
            "WARNING: noise\nERROR: [youtube] abc: Video unavailable\nmore noise".to_string(),
        );
        assert_eq!(
            describe_failure(&err),
            "Video unavailable: ERROR: [youtube] abc: Video unavailable"
        );
    }

    #[test]
    fn test_describe_failure_plain() {
        let err = DownloadError::capability_unavailable();
        assert_eq!(describe_failure(&err), "Extraction failed: capability unavailable");
    }
}
