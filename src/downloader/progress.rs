// Heuristic progress extraction from yt-dlp's textual output
//
// yt-dlp prints free-form lines while working through a playlist. Two kinds
// of markers are recognised:
// - percentage lines:   [download]  42.5% of ~ 10.00MiB at 1.00MiB/s ETA 00:05
// - skip lines:         [download] foo.mp4 has already been downloaded
// An "item N of M" line, when present, is used to place a percentage inside
// the whole playlist. Both signals are reported; the caller decides what to
// do when they disagree.

use regex::Regex;

lazy_static::lazy_static! {
    static ref PERCENT_RE: Regex = Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap();
    static ref ITEM_RE: Regex =
        Regex::new(r"\[download\]\s+Downloading (?:item|video) (\d+) of (\d+)").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
}

/// One progress observation derived from a line of output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaylistSignal {
    /// Percentage marker, already scaled to the whole playlist when the item
    /// position is known
    Percent(f32),
    /// A video was skipped because it already exists on disk
    AlreadyDownloaded { completed: usize, total: Option<usize> },
}

impl PlaylistSignal {
    /// Overall playlist percentage implied by this signal, if any
    pub fn overall_percent(&self) -> Option<f32> {
        match *self {
            Self::Percent(p) => Some(p),
            Self::AlreadyDownloaded { completed, total: Some(total) } if total > 0 => {
                Some((completed as f32 / total as f32) * 100.0)
            }
            Self::AlreadyDownloaded { .. } => None,
        }
    }
}

/// Stateful parser fed one line at a time
#[derive(Debug, Clone, Default)]
pub struct PlaylistProgressParser {
    video_count: Option<usize>,
    current_item: Option<(usize, usize)>,
    already_downloaded: usize,
}

impl PlaylistProgressParser {
    pub fn new(video_count: Option<usize>) -> Self {
        Self {
            video_count: video_count.filter(|&n| n > 0),
            ..Self::default()
        }
    }

    pub fn already_downloaded(&self) -> usize {
        self.already_downloaded
    }

    pub fn parse_line(&mut self, line: &str) -> Option<PlaylistSignal> {
        if let Some(caps) = ITEM_RE.captures(line) {
            let index: usize = caps.get(1)?.as_str().parse().ok()?;
            let total: usize = caps.get(2)?.as_str().parse().ok()?;
            if total > 0 {
                self.current_item = Some((index.clamp(1, total), total));
                if self.video_count.is_none() {
                    self.video_count = Some(total);
                }
            }
            return None;
        }

        if ALREADY_RE.is_match(line) {
            self.already_downloaded += 1;
            return Some(PlaylistSignal::AlreadyDownloaded {
                completed: self.already_downloaded,
                total: self.video_count,
            });
        }

        if line.contains("[download]") {
            let caps = PERCENT_RE.captures(line)?;
            let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
            let percent = percent.clamp(0.0, 100.0);
            let overall = match self.current_item {
                Some((index, total)) => ((index - 1) as f32 + percent / 100.0) / total as f32 * 100.0,
                None => percent,
            };
            return Some(PlaylistSignal::Percent(overall));
        }

        None
    }
}
