// Job record and its state machine

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Downloading,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    /// `completed`, `error` and `cancelled` never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

/// One tracked download request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub url: String,
    pub quality: String,
    pub format: String,
    pub status: JobStatus,
    pub progress: u8,
    pub title: String,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_time: Option<OffsetDateTime>,
    pub is_playlist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

/// Mutation sent by the worker that owns a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Started,
    Progress(u8),
    Title(String),
    VideoCount(usize),
    Completed { file_path: PathBuf },
    Failed(String),
}

impl Job {
    pub fn new(
        id: String,
        url: String,
        quality: String,
        format: String,
        is_playlist: bool,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            url,
            quality,
            format,
            status: JobStatus::Queued,
            progress: 0,
            title: String::new(),
            error: None,
            start_time: now,
            completed_time: None,
            cancelled_time: None,
            is_playlist,
            video_count: None,
            file_path: None,
        }
    }

    /// Timestamp the sweep measures retention from
    pub fn finished_at(&self) -> Option<OffsetDateTime> {
        match self.status {
            JobStatus::Completed | JobStatus::Error => self.completed_time,
            JobStatus::Cancelled => self.cancelled_time,
            JobStatus::Queued | JobStatus::Downloading => None,
        }
    }

    /// Cancel unless already terminal. Returns whether anything changed.
    pub fn cancel(&mut self, now: OffsetDateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.cancelled_time = Some(now);
        true
    }

    /// Apply a worker update. Illegal transitions are ignored and reported
    /// as `false`.
    pub fn apply(&mut self, update: JobUpdate, now: OffsetDateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        match update {
            JobUpdate::Started => {
                if self.status != JobStatus::Queued {
                    return false;
                }
                self.status = JobStatus::Downloading;
                self.progress = 0;
            }
            JobUpdate::Progress(percent) => {
                if self.status != JobStatus::Downloading {
                    return false;
                }
                let percent = percent.min(100);
                if percent <= self.progress {
                    return false;
                }
                self.progress = percent;
            }
            JobUpdate::Title(title) => {
                self.title = title;
            }
            JobUpdate::VideoCount(count) => {
                self.video_count = Some(count);
            }
            JobUpdate::Completed { file_path } => {
                if self.status != JobStatus::Downloading {
                    return false;
                }
                self.status = JobStatus::Completed;
                self.progress = 100;
                self.file_path = Some(file_path);
                self.completed_time = Some(now);
            }
            JobUpdate::Failed(message) => {
                if self.status != JobStatus::Downloading {
                    return false;
                }
                self.status = JobStatus::Error;
                self.error = Some(message);
                self.completed_time = Some(now);
            }
        }
        true
    }
}
