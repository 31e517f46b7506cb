use std::path::PathBuf;

use common::prelude::MountOptions;

use crate::provider::CommandConfig;
use crate::state::AppConfig;

#[derive(Debug, Clone)]
pub struct Config {
    // mount configuration
    /// directory under which buckets are mounted
    pub root: PathBuf,
    /// how to run the mount binary
    pub provider: CommandConfig,
    /// options passed on every mount
    pub mount_options: MountOptions,
    /// unmount buckets still in use when the service stops
    pub unmount_on_shutdown: bool,

    // plugin socket configuration
    /// unix socket the plugin API listens on
    pub socket_path: PathBuf,
    /// group ownership for the socket, if set
    pub socket_gid: Option<u32>,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve a runtime config from a loaded `config.toml`.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, crate::state::StateError> {
        Ok(Self {
            root: config.root.clone(),
            provider: config.provider.clone(),
            mount_options: config.mount.clone(),
            unmount_on_shutdown: config.unmount_on_shutdown,
            socket_path: config.socket_path.clone(),
            socket_gid: config.socket_gid,
            log_level: config.log_level()?,
            log_dir: config.log_dir.clone(),
        })
    }
}
