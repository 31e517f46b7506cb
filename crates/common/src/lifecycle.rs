//! Shared mount lifecycle
//!
//! Decides, per bucket, whether a request mounts, reuses an existing mount, or
//! tears one down. Every bucket moves through
//! `Unmounted -> Mounting -> Mounted(n) -> Unmounting -> Unmounted`, and all
//! transitions for one bucket happen under that bucket's lock. Two physical
//! mount or unmount calls for the same bucket therefore never overlap, and a
//! refcount change is atomic with the lookup that precedes it.
//!
//! Bookkeeping fails open: a record is dropped at refcount zero even if the
//! provider's unmount fails, so a single bad unmount cannot wedge a bucket.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::provider::{MountOptions, MountProvider, TargetKind};
use crate::table::{MountRecord, MountTable};
use crate::volume::PathResolver;

const MOUNTPOINT_MODE: u32 = 0o755;

/// Point-in-time view of one live mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSnapshot {
    pub bucket: String,
    pub refcount: usize,
    pub mountpoint: PathBuf,
}

pub struct LifecycleManager<P: MountProvider> {
    resolver: PathResolver,
    provider: P,
    options: MountOptions,
    table: MountTable<P::Handle>,
}

impl<P: MountProvider> LifecycleManager<P> {
    pub fn new(resolver: PathResolver, provider: P, options: MountOptions) -> Self {
        Self {
            resolver,
            provider,
            options,
            table: MountTable::new(),
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Take a reference on `bucket`'s mount, mounting it if this is the first.
    ///
    /// Returns the bucket's mountpoint.
    pub async fn acquire(&self, bucket: &str) -> Result<PathBuf, LifecycleError> {
        let mountpoint = self.resolver.bucket_mountpoint(bucket);
        let slot = self.table.slot(bucket);
        let mut record = slot.lock().await;

        if let Some(live) = record.as_mut() {
            live.refcount += 1;
            tracing::debug!(bucket, refcount = live.refcount, "reusing mount");
            return Ok(mountpoint);
        }

        match self.mount_fresh(bucket, &mountpoint).await {
            Ok(handle) => {
                *record = Some(MountRecord::new(bucket, handle));
                tracing::info!(bucket, mountpoint = %mountpoint.display(), "mounted bucket");
                Ok(mountpoint)
            }
            Err(e) => {
                self.table.prune(bucket, &slot, &record);
                Err(e)
            }
        }
    }

    /// Drop a reference on `bucket`'s mount, unmounting it with the last one.
    pub async fn release(&self, bucket: &str) -> Result<(), LifecycleError> {
        let mountpoint = self.resolver.bucket_mountpoint(bucket);
        let slot = self
            .table
            .existing(bucket)
            .ok_or_else(|| LifecycleError::NotMounted(bucket.to_string()))?;
        let mut record = slot.lock().await;

        let live = match record.take() {
            None => {
                self.table.prune(bucket, &slot, &record);
                return Err(LifecycleError::NotMounted(bucket.to_string()));
            }
            Some(mut live) if live.refcount > 1 => {
                live.refcount -= 1;
                tracing::debug!(bucket, refcount = live.refcount, "released mount reference");
                *record = Some(live);
                return Ok(());
            }
            Some(live) => live,
        };

        let result = self.unmount(bucket, &mountpoint, live).await;
        self.table.prune(bucket, &slot, &record);
        result
    }

    /// Unmount every live bucket regardless of its refcount.
    ///
    /// Failures are logged and the sweep carries on.
    pub async fn release_all(&self) {
        for bucket in self.table.buckets() {
            let Some(slot) = self.table.existing(&bucket) else {
                continue;
            };
            let mut record = slot.lock().await;

            if let Some(live) = record.take() {
                let mountpoint = self.resolver.bucket_mountpoint(&bucket);
                if let Err(e) = self.unmount(&bucket, &mountpoint, live).await {
                    tracing::error!(bucket = %bucket, "failed to unmount on shutdown: {}", e);
                }
            }

            self.table.prune(&bucket, &slot, &record);
        }
    }

    /// Drop `bucket`'s slot if nothing is mounted and nobody is waiting on it.
    pub async fn prune(&self, bucket: &str) -> bool {
        let Some(slot) = self.table.existing(bucket) else {
            return false;
        };
        let record = slot.lock().await;
        self.table.prune(bucket, &slot, &record)
    }

    /// Number of consumers holding `bucket`'s mount; zero when unmounted.
    pub async fn refcount(&self, bucket: &str) -> usize {
        match self.table.existing(bucket) {
            Some(slot) => slot.lock().await.as_ref().map_or(0, |r| r.refcount),
            None => 0,
        }
    }

    /// Live mounts, ordered by bucket.
    ///
    /// Waits behind any in-flight mount or unmount of a listed bucket.
    pub async fn mounts(&self) -> Vec<MountSnapshot> {
        let mut snapshots = Vec::new();
        for bucket in self.table.buckets() {
            let Some(slot) = self.table.existing(&bucket) else {
                continue;
            };
            let record = slot.lock().await;
            if let Some(live) = record.as_ref() {
                snapshots.push(MountSnapshot {
                    bucket: live.bucket.clone(),
                    refcount: live.refcount,
                    mountpoint: self.resolver.bucket_mountpoint(&live.bucket),
                });
            }
        }
        snapshots
    }

    async fn mount_fresh(&self, bucket: &str, mountpoint: &Path) -> Result<P::Handle, LifecycleError> {
        self.prepare_mountpoint(mountpoint).await?;

        self.provider
            .mount(bucket, mountpoint, &self.options)
            .await
            .map_err(|source| LifecycleError::MountFailure {
                bucket: bucket.to_string(),
                source,
            })
    }

    async fn prepare_mountpoint(&self, mountpoint: &Path) -> Result<(), LifecycleError> {
        match self.provider.inspect(mountpoint).await {
            Ok(Some(TargetKind::Directory)) => Ok(()),
            Ok(Some(TargetKind::Other)) => {
                Err(LifecycleError::PathConflict(mountpoint.to_path_buf()))
            }
            Ok(None) => tokio::fs::DirBuilder::new()
                .recursive(true)
                .mode(MOUNTPOINT_MODE)
                .create(mountpoint)
                .await
                .map_err(|source| LifecycleError::Directory {
                    path: mountpoint.to_path_buf(),
                    source,
                }),
            Err(e) if self.provider.is_stale_mount(&e) => {
                tracing::warn!(
                    mountpoint = %mountpoint.display(),
                    "found stale mount, forcing unmount: {}",
                    e
                );
                if let Err(e) = self.provider.force_unmount(mountpoint).await {
                    tracing::debug!(mountpoint = %mountpoint.display(), "forced unmount failed: {}", e);
                }
                Ok(())
            }
            Err(source) => Err(LifecycleError::Stat {
                path: mountpoint.to_path_buf(),
                source,
            }),
        }
    }

    async fn unmount(
        &self,
        bucket: &str,
        mountpoint: &Path,
        live: MountRecord<P::Handle>,
    ) -> Result<(), LifecycleError> {
        let result = self.provider.unmount(mountpoint, live.handle).await;

        if let Err(e) = tokio::fs::remove_dir(mountpoint).await {
            tracing::warn!(
                mountpoint = %mountpoint.display(),
                "failed to remove mountpoint: {}",
                e
            );
        }

        match result {
            Ok(()) => {
                tracing::info!(bucket, mountpoint = %mountpoint.display(), "unmounted bucket");
                Ok(())
            }
            Err(source) => Err(LifecycleError::UnmountFailure {
                bucket: bucket.to_string(),
                source,
            }),
        }
    }
}

impl<P: MountProvider> std::fmt::Debug for LifecycleManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("root", &self.resolver.root())
            .field("buckets", &self.table.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("unable to find volume mounted for bucket {0}")]
    NotMounted(String),

    #[error("{0} already exists and it's not a directory")]
    PathConflict(PathBuf),

    #[error("failed to mount bucket {bucket}: {source:#}")]
    MountFailure {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to unmount bucket {bucket}: {source:#}")]
    UnmountFailure {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create mountpoint {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to inspect mountpoint {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockProvider;

    fn manager(root: &Path) -> LifecycleManager<MockProvider> {
        LifecycleManager::new(
            PathResolver::new(root),
            MockProvider::default(),
            MountOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_acquire_creates_mountpoint_and_mounts_once() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());

        let first = manager.acquire("photos").await.unwrap();
        let second = manager.acquire("photos").await.unwrap();

        assert_eq!(first, root.path().join("photos"));
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert_eq!(manager.provider().mounts(), 1);
        assert_eq!(manager.refcount("photos").await, 2);
    }

    #[tokio::test]
    async fn test_release_unmounts_on_last_reference() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());

        let mountpoint = manager.acquire("photos").await.unwrap();
        manager.acquire("photos").await.unwrap();

        manager.release("photos").await.unwrap();
        assert_eq!(manager.provider().unmounts(), 0);
        assert_eq!(manager.refcount("photos").await, 1);

        manager.release("photos").await.unwrap();
        assert_eq!(manager.provider().unmounts(), 1);
        assert_eq!(manager.refcount("photos").await, 0);
        assert!(!mountpoint.exists());
        assert!(manager.mounts().await.is_empty());
    }

    #[tokio::test]
    async fn test_release_without_mount_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());

        assert!(matches!(
            manager.release("photos").await,
            Err(LifecycleError::NotMounted(_))
        ));

        manager.acquire("photos").await.unwrap();
        manager.release("photos").await.unwrap();
        assert!(matches!(
            manager.release("photos").await,
            Err(LifecycleError::NotMounted(_))
        ));
        assert_eq!(manager.provider().unmounts(), 1);
    }

    #[tokio::test]
    async fn test_file_at_mountpoint_conflicts() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("photos"), b"not a dir").unwrap();
        let manager = manager(root.path());

        assert!(matches!(
            manager.acquire("photos").await,
            Err(LifecycleError::PathConflict(_))
        ));
        assert_eq!(manager.provider().mounts(), 0);
        assert_eq!(manager.refcount("photos").await, 0);
    }

    #[tokio::test]
    async fn test_stale_mount_is_forced_then_remounted() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        manager.provider().mark_stale(root.path().join("photos"));

        let mountpoint = manager.acquire("photos").await.unwrap();

        assert_eq!(mountpoint, root.path().join("photos"));
        assert_eq!(manager.provider().forced_unmounts(), 1);
        assert_eq!(manager.provider().mounts(), 1);
        assert_eq!(manager.refcount("photos").await, 1);
    }

    #[tokio::test]
    async fn test_mkdir_failure_fails_acquire() {
        let dir = tempfile::tempdir().unwrap();
        // a root nested under a regular file can never be created
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let manager = manager(&blocker);
        manager.provider().hide_next_inspect(blocker.join("photos"));

        assert!(matches!(
            manager.acquire("photos").await,
            Err(LifecycleError::Directory { .. })
        ));
        assert_eq!(manager.provider().mounts(), 0);
        assert_eq!(manager.refcount("photos").await, 0);
        assert!(manager.mounts().await.is_empty());
    }

    #[tokio::test]
    async fn test_stat_failure_fails_acquire() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        manager
            .provider()
            .fail_next_inspect(root.path().join("photos"), io::ErrorKind::PermissionDenied);

        let err = manager.acquire("photos").await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Stat { ref source, .. } if source.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(manager.provider().mounts(), 0);
        assert_eq!(manager.provider().forced_unmounts(), 0);
        assert_eq!(manager.refcount("photos").await, 0);

        // the failure is not sticky
        manager.acquire("photos").await.unwrap();
        assert_eq!(manager.provider().mounts(), 1);
    }

    #[tokio::test]
    async fn test_rmdir_failure_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());

        let mountpoint = manager.acquire("photos").await.unwrap();
        std::fs::write(mountpoint.join("leftover"), b"keeps the dir busy").unwrap();

        manager.release("photos").await.unwrap();

        assert_eq!(manager.provider().unmounts(), 1);
        assert_eq!(manager.refcount("photos").await, 0);
        assert!(manager.mounts().await.is_empty());
        assert!(mountpoint.is_dir());
        assert!(matches!(
            manager.release("photos").await,
            Err(LifecycleError::NotMounted(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_mount_leaves_no_record() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        manager.provider().fail_next_mount();

        assert!(matches!(
            manager.acquire("photos").await,
            Err(LifecycleError::MountFailure { .. })
        ));
        assert_eq!(manager.refcount("photos").await, 0);
        assert!(manager.mounts().await.is_empty());

        manager.acquire("photos").await.unwrap();
        assert_eq!(manager.provider().mounts(), 1);
    }

    #[tokio::test]
    async fn test_failed_unmount_still_drops_record() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        manager.acquire("photos").await.unwrap();
        manager.provider().fail_next_unmount();

        assert!(matches!(
            manager.release("photos").await,
            Err(LifecycleError::UnmountFailure { .. })
        ));
        assert_eq!(manager.refcount("photos").await, 0);
        assert!(matches!(
            manager.release("photos").await,
            Err(LifecycleError::NotMounted(_))
        ));
    }

    #[tokio::test]
    async fn test_release_all_unmounts_everything() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        manager.acquire("a").await.unwrap();
        manager.acquire("a").await.unwrap();
        manager.acquire("b").await.unwrap();

        manager.release_all().await;

        assert_eq!(manager.provider().unmounts(), 2);
        assert!(manager.mounts().await.is_empty());
    }

    #[tokio::test]
    async fn test_mounts_snapshot() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        manager.acquire("b").await.unwrap();
        manager.acquire("a").await.unwrap();
        manager.acquire("a").await.unwrap();

        let mounts = manager.mounts().await;
        assert_eq!(
            mounts,
            vec![
                MountSnapshot {
                    bucket: "a".to_string(),
                    refcount: 2,
                    mountpoint: root.path().join("a"),
                },
                MountSnapshot {
                    bucket: "b".to_string(),
                    refcount: 1,
                    mountpoint: root.path().join("b"),
                },
            ]
        );
    }
}
