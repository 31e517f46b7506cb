//! Test helpers: an in-memory mount provider that records what it was asked
//! to do and flags overlapping calls for the same target.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::provider::{inspect_path, MountOptions, MountProvider, TargetKind};

/// Handle returned by [`MockProvider::mount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockHandle {
    pub bucket: String,
    pub generation: usize,
}

/// What the next inspection of a target reports instead of looking at the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InspectOverride {
    Missing,
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
pub struct MockProvider {
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
    forced_unmounts: AtomicUsize,
    overlaps: AtomicUsize,
    fail_mount: AtomicBool,
    fail_unmount: AtomicBool,
    in_flight: Mutex<HashSet<PathBuf>>,
    overrides: Mutex<HashMap<PathBuf, InspectOverride>>,
    mounted: Mutex<HashSet<PathBuf>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// A provider whose mount and unmount calls take `delay`, widening the
    /// window for concurrent callers to collide.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub fn unmounts(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }

    pub fn forced_unmounts(&self) -> usize {
        self.forced_unmounts.load(Ordering::SeqCst)
    }

    /// Calls that started while another call for the same target was running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self, target: &Path) -> bool {
        self.mounted.lock().contains(target)
    }

    pub fn fail_next_mount(&self) {
        self.fail_mount.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_unmount(&self) {
        self.fail_unmount.store(true, Ordering::SeqCst);
    }

    /// Make the next inspection of `target` report a disconnected FUSE endpoint.
    pub fn mark_stale(&self, target: impl Into<PathBuf>) {
        self.fail_next_inspect(target, io::ErrorKind::NotConnected);
    }

    /// Make the next inspection of `target` fail with `kind`.
    pub fn fail_next_inspect(&self, target: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.overrides
            .lock()
            .insert(target.into(), InspectOverride::Fail(kind));
    }

    /// Make the next inspection of `target` report nothing there, whatever is on disk.
    pub fn hide_next_inspect(&self, target: impl Into<PathBuf>) {
        self.overrides.lock().insert(target.into(), InspectOverride::Missing);
    }

    async fn enter(&self, target: &Path) {
        if !self.in_flight.lock().insert(target.to_path_buf()) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn exit(&self, target: &Path) {
        self.in_flight.lock().remove(target);
    }
}

#[async_trait::async_trait]
impl MountProvider for MockProvider {
    type Handle = MockHandle;

    async fn mount(
        &self,
        bucket: &str,
        target: &Path,
        _options: &MountOptions,
    ) -> anyhow::Result<MockHandle> {
        self.enter(target).await;
        let result = if self.fail_mount.swap(false, Ordering::SeqCst) {
            Err(anyhow::anyhow!("mock mount of {} refused", bucket))
        } else {
            let generation = self.mounts.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.mounted.lock().insert(target.to_path_buf()) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            Ok(MockHandle {
                bucket: bucket.to_string(),
                generation,
            })
        };
        self.exit(target);
        result
    }

    async fn unmount(&self, target: &Path, _handle: MockHandle) -> anyhow::Result<()> {
        self.enter(target).await;
        self.mounted.lock().remove(target);
        let result = if self.fail_unmount.swap(false, Ordering::SeqCst) {
            Err(anyhow::anyhow!("mock unmount of {} refused", target.display()))
        } else {
            self.unmounts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        self.exit(target);
        result
    }

    async fn force_unmount(&self, target: &Path) -> anyhow::Result<()> {
        self.forced_unmounts.fetch_add(1, Ordering::SeqCst);
        self.mounted.lock().remove(target);
        Ok(())
    }

    async fn inspect(&self, target: &Path) -> io::Result<Option<TargetKind>> {
        let pending = self.overrides.lock().remove(target);
        match pending {
            Some(InspectOverride::Missing) => Ok(None),
            Some(InspectOverride::Fail(kind)) => Err(io::Error::from(kind)),
            None => inspect_path(target).await,
        }
    }
}
