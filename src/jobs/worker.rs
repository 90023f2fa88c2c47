// Per-job worker task
//
// Each submitted job gets its own tokio task. The task waits for a permit
// when a concurrency limit is configured, drives the extractor and turns
// progress events into store updates. Cancellation drops the in-flight
// download future, which kills any yt-dlp child process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::models::{Job, JobUpdate};
use super::store::JobStore;
use crate::downloader::diagnostics::describe_failure;
use crate::downloader::utils::sanitize_filename;
use crate::downloader::{DownloadError, DownloadRequest, Extractor, ProgressEmitter};

#[derive(Clone)]
pub struct JobRunner {
    store: JobStore,
    extractor: Arc<Extractor>,
    downloads_dir: PathBuf,
    limiter: Option<Arc<Semaphore>>,
}

impl JobRunner {
    /// `max_concurrent == 0` means no limit
    pub fn new(
        store: JobStore,
        extractor: Arc<Extractor>,
        downloads_dir: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            extractor,
            downloads_dir: downloads_dir.into(),
            limiter: (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent))),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Create a job and start working on it in the background. Returns the
    /// freshly created (`queued`) job.
    pub fn submit(&self, url: &str, quality: &str, format: &str, is_playlist: bool) -> Job {
        let job = self.store.create_job(url, quality, format, is_playlist);
        let runner = self.clone();
        let spawned = job.clone();
        tokio::spawn(async move { runner.run(spawned).await });
        job
    }

    async fn run(self, job: Job) {
        let Some(cancel) = self.store.cancellation_token(&job.id) else {
            return;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(job_id = %job.id, "download cancelled, worker stopped");
            }
            result = self.execute(&job) => match result {
                Ok(path) => {
                    info!(job_id = %job.id, path = %path.display(), "download completed");
                    self.store.advance(&job.id, JobUpdate::Completed { file_path: path });
                }
                Err(e) => {
                    let message = describe_failure(&e);
                    warn!(job_id = %job.id, error = %e, "download failed");
                    self.store.advance(&job.id, JobUpdate::Failed(message));
                }
            },
        }
    }

    async fn execute(&self, job: &Job) -> Result<PathBuf, DownloadError> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| DownloadError::Execution(e.to_string()))?,
            ),
            None => None,
        };

        if !self.store.advance(&job.id, JobUpdate::Started) {
            debug!(job_id = %job.id, "job no longer queued, skipping");
            return Err(DownloadError::Execution("job is no longer queued".into()));
        }

        let request = DownloadRequest::new(job.quality.clone(), job.format.clone());
        let (emitter, mut progress_rx) = ProgressEmitter::channel();

        let store = self.store.clone();
        let job_id = job.id.clone();
        let forward = async move {
            while let Some(progress) = progress_rx.recv().await {
                store.advance(&job_id, JobUpdate::Progress(progress.percent));
            }
        };

        let work = async move {
            let result = if job.is_playlist {
                self.download_playlist(job, &request, &emitter).await
            } else {
                self.download_single(job, &request, &emitter).await
            };
            drop(emitter);
            result
        };

        let (result, ()) = tokio::join!(work, forward);
        result
    }

    async fn download_single(
        &self,
        job: &Job,
        request: &DownloadRequest,
        emitter: &ProgressEmitter,
    ) -> Result<PathBuf, DownloadError> {
        let title = match self.extractor.get_video_metadata(&job.url).await {
            Ok(meta) => meta.title,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "metadata unavailable, continuing without title");
                String::new()
            }
        };
        if !title.is_empty() {
            self.store.advance(&job.id, JobUpdate::Title(title.clone()));
        }

        let stem = if title.trim().is_empty() {
            job.id.clone()
        } else {
            sanitize_filename(&title)
        };
        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let path = self.downloads_dir.join(format!("{}.{}", stem, job.format));

        let mut file = tokio::fs::File::create(&path).await?;
        match self
            .extractor
            .download_single(&job.url, request, &mut file, emitter)
            .await
        {
            Ok(bytes) => {
                debug!(job_id = %job.id, bytes, "stream finished");
                Ok(path)
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %rm, "could not remove partial file");
                }
                Err(e)
            }
        }
    }

    async fn download_playlist(
        &self,
        job: &Job,
        request: &DownloadRequest,
        emitter: &ProgressEmitter,
    ) -> Result<PathBuf, DownloadError> {
        let video_count = match self.extractor.get_playlist_metadata(&job.url).await {
            Ok(meta) => {
                self.store.advance(&job.id, JobUpdate::Title(meta.title));
                if meta.video_count > 0 {
                    self.store.advance(&job.id, JobUpdate::VideoCount(meta.video_count));
                    Some(meta.video_count)
                } else {
                    None
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "playlist metadata unavailable");
                None
            }
        };

        let dir = self.downloads_dir.join(format!("playlist_{}", job.id));
        self.extractor
            .download_playlist(&job.url, request, &dir, video_count, emitter)
            .await?;
        Ok(dir)
    }
}
