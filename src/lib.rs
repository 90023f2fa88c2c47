pub mod api;
pub mod config;
pub mod downloader;
pub mod jobs;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use api::AppState;
use config::ServerConfig;
use downloader::backends::{OEmbedBackend, YtDlpBackend, YtdlBackend};
use downloader::Extractor;
use jobs::{JobRunner, JobStore, Sweeper};

/// Start the HTTP server and the sweep task, and block until Ctrl+C
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.downloads_dir)
        .await
        .with_context(|| format!("creating {}", config.downloads_dir.display()))?;

    let primary = YtDlpBackend::new(config.ytdlp_path.clone(), config.extract_timeout_secs);
    let request_timeout = Duration::from_secs(config.extract_timeout_secs);
    let http = OEmbedBackend::new(request_timeout).context("building HTTP client")?;
    let secondary = YtdlBackend::new(http, request_timeout);
    let extractor = Arc::new(Extractor::new(Arc::new(primary), Arc::new(secondary)));

    if extractor.check_capability().await {
        info!(path = %config.ytdlp_path, "yt-dlp available, playlist downloads enabled");
    } else {
        warn!(path = %config.ytdlp_path, "yt-dlp not found, using reduced fallback; playlist downloads disabled");
    }

    let store = JobStore::new();
    let runner = JobRunner::new(
        store.clone(),
        extractor,
        config.downloads_dir.clone(),
        config.max_concurrent_downloads,
    );
    let sweeper = Sweeper::spawn(store, config.sweep_interval, config.retention);

    let app = api::router(AppState { runner });
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(%addr, downloads_dir = %config.downloads_dir.display(), "server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server");

    sweeper.stop().await;
    info!("server stopped");
    served
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
}
