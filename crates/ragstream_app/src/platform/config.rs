use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::engine_info;
use ragstream_engine::{ClientSettings, PollSettings};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "ragstream.ron";
pub const BASE_URL_ENV: &str = "RAG_BASE_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no backend base URL configured (use --base-url, RAG_BASE_URL or base_url in ragstream.ron)")]
    MissingBaseUrl,
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("cannot read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Everything read from the config file is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    poll_deadline_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub base_url: Url,
    pub poll_interval_ms: u64,
    /// Zero disables the deadline.
    pub poll_deadline_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Raw inputs, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Explicit `--config` path. A missing explicit file is an error.
    pub file: Option<PathBuf>,
    pub env_base_url: Option<String>,
    pub cli_base_url: Option<String>,
}

impl AppConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
    pub const DEFAULT_POLL_DEADLINE_SECS: u64 = 30 * 60;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    pub fn resolve(sources: &ConfigSources) -> Result<Self, ConfigError> {
        let file = match &sources.file {
            Some(path) => read_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    read_file(path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let raw_url = [
            sources.cli_base_url.as_deref(),
            sources.env_base_url.as_deref(),
            file.base_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .ok_or(ConfigError::MissingBaseUrl)?;

        Ok(Self {
            base_url: parse_base_url(raw_url)?,
            poll_interval_ms: file
                .poll_interval_ms
                .unwrap_or(Self::DEFAULT_POLL_INTERVAL_MS),
            poll_deadline_secs: file
                .poll_deadline_secs
                .unwrap_or(Self::DEFAULT_POLL_DEADLINE_SECS),
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::new(self.base_url.clone());
        settings.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        settings
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            deadline: (self.poll_deadline_secs > 0)
                .then(|| Duration::from_secs(self.poll_deadline_secs)),
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = ron::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    engine_info!("Loaded config from {:?}", path);
    Ok(config)
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}
