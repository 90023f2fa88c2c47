// Extraction backends: yt-dlp (primary), rusty_ytdl (secondary) and the
// plain HTTP/oEmbed fallback the secondary leans on
pub mod oembed;
pub mod ytdl;
pub mod ytdlp;
pub use oembed::OEmbedBackend;
pub use ytdl::YtdlBackend;
pub use ytdlp::YtDlpBackend;
