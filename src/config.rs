// Server configuration read from environment variables

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::downloader::utils::find_ytdlp;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_RETENTION_HOURS: u64 = 24;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub downloads_dir: PathBuf,
    pub ytdlp_path: String,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub extract_timeout_secs: u64,
    /// 0 = unbounded
    pub max_concurrent_downloads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            downloads_dir: PathBuf::from("./downloads"),
            ytdlp_path: "yt-dlp".to_string(),
            retention: Duration::from_secs(DEFAULT_RETENTION_HOURS * 3600),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            extract_timeout_secs: DEFAULT_EXTRACT_TIMEOUT_SECS,
            max_concurrent_downloads: 0,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build from an explicit variable map. Missing or blank values fall
    /// back to defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let host = match get("HOST") {
            Some(v) => parse("HOST", v)?,
            None => defaults.host,
        };
        let port = match get("PORT") {
            Some(v) => parse("PORT", v)?,
            None => defaults.port,
        };
        let downloads_dir = get("DOWNLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.downloads_dir);
        let ytdlp_path = get("YTDLP_PATH")
            .map(str::to_string)
            .unwrap_or_else(find_ytdlp);

        let retention_hours: u64 = match get("RETENTION_HOURS") {
            Some(v) => parse("RETENTION_HOURS", v)?,
            None => DEFAULT_RETENTION_HOURS,
        };
        let sweep_secs: u64 = match get("SWEEP_INTERVAL_SECS") {
            Some(v) => parse("SWEEP_INTERVAL_SECS", v)?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "SWEEP_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        let extract_timeout_secs = match get("EXTRACT_TIMEOUT_SECS") {
            Some(v) => parse("EXTRACT_TIMEOUT_SECS", v)?,
            None => defaults.extract_timeout_secs,
        };
        let max_concurrent_downloads = match get("MAX_CONCURRENT_DOWNLOADS") {
            Some(v) => parse("MAX_CONCURRENT_DOWNLOADS", v)?,
            None => defaults.max_concurrent_downloads,
        };

        Ok(Self {
            host,
            port,
            downloads_dir,
            ytdlp_path,
            retention: Duration::from_secs(retention_hours.saturating_mul(3600)),
            sweep_interval: Duration::from_secs(sweep_secs),
            extract_timeout_secs,
            max_concurrent_downloads,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
