pub mod utils;

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_FILE_PREFIX: &str = "bucketvol.log";

/// Handle for gracefully shutting down the daemon service.
pub struct ShutdownHandle {
    graceful_waiter: tokio::task::JoinHandle<()>,
    handles: Vec<tokio::task::JoinHandle<()>>,
    shutdown_tx: watch::Sender<()>,
}

impl ShutdownHandle {
    /// Block until a signal or [`ShutdownHandle::shutdown`] stops the service
    /// and every service task has finished. Exits the process if the tasks
    /// outlive the final timeout.
    pub async fn wait(self) {
        let _ = self.graceful_waiter.await;

        match timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(self.handles)).await {
            Ok(results) => {
                for err in results.into_iter().filter_map(Result::err) {
                    tracing::error!("service task did not finish cleanly: {}", err);
                }
            }
            Err(_) => {
                tracing::error!(
                    "service tasks still running {}s after shutdown, exiting",
                    FINAL_SHUTDOWN_TIMEOUT.as_secs()
                );
                std::process::exit(4);
            }
        }
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// `RUST_LOG` directives on top of the configured level.
fn level_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Log to stdout, and to a daily rolling file when `log_dir` is set and
/// usable. The returned guards flush the writers when dropped.
fn init_logging(service_config: &ServiceConfig) -> Vec<WorkerGuard> {
    let level = service_config.log_level;
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![stdout_guard];

    let file_layer = match service_config.log_dir.as_deref() {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                guards.push(guard);
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(level_filter(level)),
                )
            }
            Err(e) => {
                eprintln!("not logging to {}: {}", dir.display(), e);
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_writer(stdout)
                .with_filter(level_filter(level)),
        )
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

/// Create service state from config, exiting on error.
async fn create_state(service_config: &ServiceConfig) -> ServiceState {
    match ServiceState::from_config(service_config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(3);
        }
    }
}

/// Create state and spawn the plugin server, returning the state handle.
///
/// The returned `ShutdownHandle` must be kept alive; dropping it does not stop the service.
pub async fn start_service(service_config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let (graceful_waiter, shutdown_tx, shutdown_rx) = match utils::graceful_shutdown_blocker() {
        Ok(blocker) => blocker,
        Err(e) => {
            tracing::error!("failed to install signal handlers: {}", e);
            std::process::exit(2);
        }
    };
    let state = create_state(service_config).await;

    let mut handles = Vec::new();

    // Spawn plugin server; buckets are released once it stops taking requests
    let plugin_state = state.clone();
    let plugin_config = http_server::Config::new(
        service_config.socket_path.clone(),
        service_config.socket_gid,
    );
    let plugin_rx = shutdown_rx.clone();
    let plugin_handle = tokio::spawn(async move {
        let driver = plugin_state.driver().clone();
        if let Err(e) = http_server::run_plugin(plugin_config, driver, plugin_rx).await {
            tracing::error!("Plugin server error: {}", e);
        }
        plugin_state.shutdown().await;
    });
    handles.push(plugin_handle);

    tracing::info!(
        root = %service_config.root.display(),
        socket = %service_config.socket_path.display(),
        "Running: volume plugin"
    );

    let handle = ShutdownHandle {
        graceful_waiter,
        handles,
        shutdown_tx,
    };

    (state, handle)
}

/// Spawns the daemon service: the plugin server on its unix socket.
/// Blocks until shutdown signal is received. Use for CLI binary usage.
pub async fn spawn_service(service_config: &ServiceConfig) {
    let _guards = init_logging(service_config);
    let (_, handle) = start_service(service_config).await;
    handle.wait().await;
}
