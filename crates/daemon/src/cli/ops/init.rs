use std::path::PathBuf;

use clap::Args;

use bucketvol_daemon::provider::CommandConfig;
use bucketvol_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Directory under which buckets are mounted
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Unix socket for the plugin API
    #[arg(long)]
    pub socket_path: Option<PathBuf>,

    /// Mount binary (default: goofys)
    #[arg(long)]
    pub program: Option<String>,

    /// Object store region
    #[arg(long)]
    pub region: Option<String>,

    /// S3-compatible endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = AppConfig::default();
        let provider = CommandConfig {
            program: self.program.clone().unwrap_or(defaults.provider.program.clone()),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            ..defaults.provider.clone()
        };
        let config = AppConfig {
            root: self.root.clone().unwrap_or(defaults.root.clone()),
            socket_path: self.socket_path.clone().unwrap_or(defaults.socket_path.clone()),
            provider,
            ..defaults
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized bucketvol directory at: {}\n\
             - Config: {}\n\
             - Mount root: {}\n\
             - Socket: {}\n\
             - Mount program: {}",
            state.config_dir.display(),
            state.config_path.display(),
            state.config.root.display(),
            state.config.socket_path.display(),
            state.config.provider.program,
        );

        Ok(output)
    }
}
