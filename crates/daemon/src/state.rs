use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use common::prelude::MountOptions;

use crate::provider::CommandConfig;

pub const APP_NAME: &str = "bucketvol";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_ROOT: &str = "/var/lib/docker-volumes/bucketvol";
pub const DEFAULT_SOCKET_PATH: &str = "/run/docker/plugins/bucketvol.sock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory under which every bucket is mounted
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Unix socket the plugin API listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Group to hand the socket to, so the engine can connect without root
    #[serde(default)]
    pub socket_gid: Option<u32>,
    /// Unmount every bucket still in use when the daemon stops
    #[serde(default = "default_unmount_on_shutdown")]
    pub unmount_on_shutdown: bool,
    /// Default log level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for log files (stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// How buckets are mounted
    #[serde(default)]
    pub provider: CommandConfig,
    /// Options passed on every mount
    #[serde(default)]
    pub mount: MountOptions,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_unmount_on_shutdown() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            socket_path: default_socket_path(),
            socket_gid: None,
            unmount_on_shutdown: default_unmount_on_shutdown(),
            log_level: default_log_level(),
            log_dir: None,
            provider: CommandConfig::default(),
            mount: MountOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> Result<tracing::Level, StateError> {
        self.log_level
            .parse()
            .map_err(|_| StateError::InvalidLogLevel(self.log_level.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the config directory (~/.bucketvol)
    pub config_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the config directory path (custom or default ~/.bucketvol)
    pub fn config_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new config directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let config_dir = Self::config_dir(custom_path)?;

        if config_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&config_dir)?;

        let config = config.unwrap_or_default();
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            config_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the config directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let config_dir = Self::config_dir(custom_path)?;

        if !config_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            config_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("bucketvol directory not initialized. Run 'bucketvol init' first")]
    NotInitialized,

    #[error("bucketvol directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
