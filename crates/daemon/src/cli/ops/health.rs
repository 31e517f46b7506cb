use std::path::Path;
use std::time::Duration;

use clap::Args;
use tokio::net::UnixStream;
use tokio::time::timeout;

use bucketvol_daemon::state::AppState;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// Carries the full report so the failing check is visible.
    #[error("Health check failed:\n{0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        // 1. Check config directory
        lines.push("Config:".to_string());
        let state = match AppState::load(ctx.config_path.clone()) {
            Ok(state) => state,
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Err(HealthError::Failed(lines.join("\n")));
            }
        };
        lines.push(format!("  directory:    {}", state.config_dir.display()));
        lines.push("  config.toml:  OK".to_string());
        lines.push(format!("  program:      {}", state.config.provider.program));

        // 2. Check the mount root
        let root = &state.config.root;
        lines.push(String::new());
        lines.push(format!("Mount root ({}):", root.display()));
        let root_ok = match tokio::fs::metadata(root).await {
            Ok(meta) if meta.is_dir() => {
                lines.push("  exists: OK".to_string());
                true
            }
            Ok(_) => {
                lines.push("  exists: NOT A DIRECTORY".to_string());
                false
            }
            Err(_) => {
                lines.push("  exists: MISSING".to_string());
                false
            }
        };

        // 3. Check the daemon is accepting connections
        let socket = &state.config.socket_path;
        lines.push(String::new());
        lines.push(format!("Daemon ({}):", socket.display()));
        let socket_status = check_socket(socket).await;
        lines.push(format!("  socket: {}", socket_status));

        let report = lines.join("\n");
        if root_ok && socket_status == "OK" {
            Ok(report)
        } else {
            Err(HealthError::Failed(report))
        }
    }
}

async fn check_socket(path: &Path) -> &'static str {
    match timeout(CONNECT_TIMEOUT, UnixStream::connect(path)).await {
        Ok(Ok(_)) => "OK",
        Ok(Err(_)) => "NOT REACHABLE",
        Err(_) => "TIMED OUT",
    }
}
