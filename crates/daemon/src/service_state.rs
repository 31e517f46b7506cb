use std::sync::Arc;

use common::prelude::Driver;

use super::service_config::Config;
use crate::provider::CommandProvider;

/// Main service state: the one driver every request goes through
#[derive(Clone)]
pub struct State {
    driver: Arc<Driver<CommandProvider>>,
    unmount_on_shutdown: bool,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Make sure the mount root exists
        tokio::fs::create_dir_all(&config.root)
            .await
            .map_err(|source| StateSetupError::Root {
                path: config.root.display().to_string(),
                source,
            })?;
        tracing::info!(root = %config.root.display(), "mount root ready");

        // 2. Build the provider and the driver that owns all mount state
        let provider = CommandProvider::new(config.provider.clone());
        tracing::info!(program = %config.provider.program, "using mount command");
        let driver = Driver::new(&config.root, provider, config.mount_options.clone());

        Ok(Self {
            driver: Arc::new(driver),
            unmount_on_shutdown: config.unmount_on_shutdown,
        })
    }

    pub fn driver(&self) -> &Arc<Driver<CommandProvider>> {
        &self.driver
    }

    /// Release whatever is still mounted, if configured to.
    pub async fn shutdown(&self) {
        if !self.unmount_on_shutdown {
            tracing::info!("leaving buckets mounted on shutdown");
            return;
        }
        self.driver.shutdown().await;
    }
}

impl AsRef<Driver<CommandProvider>> for State {
    fn as_ref(&self) -> &Driver<CommandProvider> {
        &self.driver
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to create mount root {path}: {source}")]
    Root {
        path: String,
        source: std::io::Error,
    },
}
