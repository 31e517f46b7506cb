//! The seam between mount bookkeeping and whatever actually mounts a bucket.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Ownership and access options handed to the provider on every mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    /// Owner of files in the mounted filesystem
    #[serde(default)]
    pub uid: Option<u32>,
    /// Group of files in the mounted filesystem
    #[serde(default)]
    pub gid: Option<u32>,
    /// Permission bits for directories, e.g. `0o755`
    #[serde(default)]
    pub dir_mode: Option<u32>,
    /// Permission bits for files, e.g. `0o644`
    #[serde(default)]
    pub file_mode: Option<u32>,
    /// Let users other than the mounting one (i.e. containers) see the mount
    #[serde(default = "default_allow_other")]
    pub allow_other: bool,
    #[serde(default)]
    pub read_only: bool,
}

fn default_allow_other() -> bool {
    true
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            uid: None,
            gid: None,
            dir_mode: None,
            file_mode: None,
            allow_other: default_allow_other(),
            read_only: false,
        }
    }
}

/// What sits at a mount target before we mount onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Directory,
    /// A regular file, symlink, socket, ...: anything we must not mount over.
    Other,
}

/// Performs physical mounts of a bucket onto a local directory.
///
/// Implementations are called with the bucket's lock held, so a provider never
/// sees two concurrent calls for the same bucket.
#[async_trait::async_trait]
pub trait MountProvider: Send + Sync + 'static {
    /// Opaque state kept for as long as the bucket stays mounted.
    type Handle: Send + Sync + 'static;

    async fn mount(
        &self,
        bucket: &str,
        target: &Path,
        options: &MountOptions,
    ) -> anyhow::Result<Self::Handle>;

    async fn unmount(&self, target: &Path, handle: Self::Handle) -> anyhow::Result<()>;

    /// Tear down a mount we hold no handle for, e.g. one left by a crashed
    /// process.
    async fn force_unmount(&self, target: &Path) -> anyhow::Result<()>;

    /// Inspect the mount target without following symlinks. `Ok(None)` means
    /// nothing exists there.
    async fn inspect(&self, target: &Path) -> io::Result<Option<TargetKind>> {
        inspect_path(target).await
    }

    /// Whether an inspection error means a previous mount died underneath us.
    ///
    /// FUSE reports ENOTCONN for a mountpoint whose server process is gone.
    fn is_stale_mount(&self, err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::NotConnected
    }
}

/// Classify whatever exists at `target` using `lstat`.
pub async fn inspect_path(target: &Path) -> io::Result<Option<TargetKind>> {
    match tokio::fs::symlink_metadata(target).await {
        Ok(meta) if meta.is_dir() => Ok(Some(TargetKind::Directory)),
        Ok(_) => Ok(Some(TargetKind::Other)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
