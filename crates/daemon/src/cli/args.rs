pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bucketvol")]
#[command(about = "Docker volume plugin that mounts object-store buckets with FUSE")]
#[command(version)]
pub struct Args {
    /// Path to the bucketvol config directory (defaults to ~/.bucketvol)
    #[arg(long, global = true, env = "BUCKETVOL_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
