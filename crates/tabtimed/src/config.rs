//! Daemon configuration.
//!
//! Defaults, overridden by `$CONFIG_DIR/tabtime/config.toml` if present,
//! overridden in turn by `TABTIME_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::store::{LEDGER_FILE, SESSION_FILE};

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tabtime.sock";

/// Default backend base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

pub const ENV_BACKEND_URL: &str = "TABTIME_BACKEND_URL";
pub const ENV_SOCKET: &str = "TABTIME_SOCKET";
pub const ENV_STATE_DIR: &str = "TABTIME_STATE_DIR";
pub const ENV_SYNC_INTERVAL: &str = "TABTIME_SYNC_INTERVAL_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the backend (`/login`, `/register`, `/track` hang off it).
    pub backend_url: String,
    pub socket_path: PathBuf,
    /// Directory holding `ledger.json`, `session.json`, the PID file and log.
    pub state_dir: PathBuf,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            state_dir: default_state_dir(),
            sync_interval_secs: 60,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Loads from the default config file (if any) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match default_config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Reads a TOML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `TABTIME_*` overrides read through `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(socket) = lookup(ENV_SOCKET) {
            self.socket_path = PathBuf::from(socket);
        }
        if let Some(dir) = lookup(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(ENV_SYNC_INTERVAL) {
            self.sync_interval_secs = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SYNC_INTERVAL.to_string(),
                value: secs.clone(),
            })?;
        }
        Ok(self)
    }

    /// Tick period, never shorter than one second.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join(LEDGER_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join(SESSION_FILE)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("tabtimed.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("tabtimed.log")
    }
}

/// `$CONFIG_DIR/tabtime/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tabtime").join("config.toml"))
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tabtime")
}
