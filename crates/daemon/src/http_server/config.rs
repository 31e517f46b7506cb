use std::path::PathBuf;

/// Where and how the plugin API is served.
#[derive(Debug, Clone)]
pub struct Config {
    // unix socket the engine connects to
    pub socket_path: PathBuf,
    // group ownership for the socket
    pub socket_gid: Option<u32>,
    // permission bits for the socket
    pub socket_mode: u32,
    // log level for http tracing
    pub log_level: tracing::Level,
}

pub const DEFAULT_SOCKET_MODE: u32 = 0o660;

impl Config {
    pub fn new(socket_path: PathBuf, socket_gid: Option<u32>) -> Self {
        tracing::info!(
            "Creating plugin server Config: socket_path={}, socket_gid={:?}",
            socket_path.display(),
            socket_gid
        );
        Self {
            socket_path,
            socket_gid,
            socket_mode: DEFAULT_SOCKET_MODE,
            log_level: tracing::Level::INFO,
        }
    }
}
