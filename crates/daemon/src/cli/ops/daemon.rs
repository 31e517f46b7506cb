use std::path::PathBuf;

use clap::Args;

use bucketvol_daemon::state::AppState;
use bucketvol_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override the mount root (default from config)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Override the plugin socket path (default from config)
    #[arg(long)]
    pub socket_path: Option<PathBuf>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Override the log level (default from config)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] bucketvol_daemon::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        // Load state from config path (or default ~/.bucketvol)
        let mut state = AppState::load(ctx.config_path.clone())?;

        // Flags win over config.toml
        if let Some(root) = &self.root {
            state.config.root = root.clone();
        }
        if let Some(socket_path) = &self.socket_path {
            state.config.socket_path = socket_path.clone();
        }
        if let Some(log_dir) = &self.log_dir {
            state.config.log_dir = Some(log_dir.clone());
        }
        if let Some(log_level) = &self.log_level {
            state.config.log_level = log_level.clone();
        }

        let config = ServiceConfig::from_app_config(&state.config)?;

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
