use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

use common::prelude::{Driver, MountProvider};

mod config;
mod handlers;
mod health;
pub mod plugin;

pub use config::Config;

const STATUS_PREFIX: &str = "/_status";

/// Plugin requests are small JSON documents
pub const MAX_REQUEST_SIZE_BYTES: usize = 1024 * 1024;

/// Plugin protocol endpoints plus `/_status` health routes.
pub fn router<P: MountProvider>(driver: Arc<Driver<P>>) -> Router {
    Router::new()
        .merge(plugin::router(driver.clone()))
        .nest(STATUS_PREFIX, health::router(driver))
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE_BYTES))
}

/// Serve the plugin API on a unix socket until `shutdown_rx` fires, then remove
/// the socket file.
pub async fn run_plugin<P: MountProvider>(
    config: Config,
    driver: Arc<Driver<P>>,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let router = router(driver).layer(trace_layer);

    let listener = bind_socket(&config).await?;
    tracing::info!(socket = %config.socket_path.display(), "plugin server listening");

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await;

    remove_socket(&config.socket_path).await;
    result?;

    Ok(())
}

async fn bind_socket(config: &Config) -> Result<UnixListener, HttpServerError> {
    let path = &config.socket_path;
    let socket_err = |source: io::Error| HttpServerError::Socket {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(socket_err)?;
    }

    // a socket left behind by a previous run would make bind fail
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::warn!(socket = %path.display(), "removed leftover socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(socket_err(e)),
    }

    let listener = UnixListener::bind(path).map_err(socket_err)?;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(config.socket_mode))
        .await
        .map_err(socket_err)?;

    if let Some(gid) = config.socket_gid {
        std::os::unix::fs::chown(path, None, Some(gid)).map_err(socket_err)?;
    }

    Ok(listener)
}

async fn remove_socket(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(socket = %path.display(), "removed socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(socket = %path.display(), "failed to remove socket: {}", e),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("failed to set up socket {}: {source}", path.display())]
    Socket { path: PathBuf, source: io::Error },

    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] io::Error),
}
