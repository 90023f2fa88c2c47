use youtube_download_server::config::ServerConfig;
use youtube_download_server::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let config = ServerConfig::from_env()?;
    youtube_download_server::run(config).await
}
