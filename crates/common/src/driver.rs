//! Volume driver operations
//!
//! Adapts each plugin operation onto the registry and the lifecycle manager.
//! No decisions are made here beyond name parsing: mount state belongs to
//! [`LifecycleManager`], declared volumes to [`VolumeRegistry`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::lifecycle::{LifecycleError, LifecycleManager, MountSnapshot};
use crate::provider::{MountOptions, MountProvider};
use crate::registry::{RegistryError, VolumeEntry, VolumeRegistry};
use crate::volume::{PathResolver, VolumeName, VolumeNameError};

/// A volume as reported back to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VolumeStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    pub bucket: String,
    /// Containers currently sharing the bucket's mount
    pub consumers: usize,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Whether volumes are visible to one engine or a whole cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Global,
}

pub struct Driver<P: MountProvider> {
    registry: VolumeRegistry,
    lifecycle: LifecycleManager<P>,
}

impl<P: MountProvider> Driver<P> {
    pub fn new(root: impl Into<PathBuf>, provider: P, options: MountOptions) -> Self {
        Self {
            registry: VolumeRegistry::new(),
            lifecycle: LifecycleManager::new(PathResolver::new(root), provider, options),
        }
    }

    pub fn registry(&self) -> &VolumeRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &LifecycleManager<P> {
        &self.lifecycle
    }

    pub fn create(
        &self,
        name: &str,
        options: BTreeMap<String, String>,
    ) -> Result<(), DriverError> {
        let name = VolumeName::parse(name)?;
        tracing::info!(volume = %name, ?options, "creating volume");
        self.registry.create(name, options)?;
        Ok(())
    }

    /// Look a volume up. Unknown (or unparseable) names are `None`, not errors.
    pub async fn get(&self, name: &str) -> Result<Option<VolumeInfo>, DriverError> {
        let Ok(name) = VolumeName::parse(name) else {
            return Ok(None);
        };

        let entry = match self.registry.get(&name) {
            Ok(entry) => entry,
            Err(RegistryError::NotRegistered(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let consumers = self.lifecycle.refcount(entry.name.bucket()).await;
        let mut info = self.info(&entry);
        info.status = Some(VolumeStatus {
            bucket: entry.name.bucket().to_string(),
            consumers,
            options: entry.options,
        });
        Ok(Some(info))
    }

    pub fn list(&self) -> Vec<VolumeInfo> {
        self.registry
            .list()
            .iter()
            .map(|entry| self.info(entry))
            .collect()
    }

    /// Forget a volume. Mounts that are still in use are left alone; only an
    /// idle bucket with no remaining volumes has its mount state dropped.
    pub async fn remove(&self, name: &str) -> Result<(), DriverError> {
        let Ok(name) = VolumeName::parse(name) else {
            return Ok(());
        };

        tracing::info!(volume = %name, "removing volume");
        self.registry.remove(&name);

        let bucket = name.bucket();
        if !self.registry.references_bucket(bucket) && self.lifecycle.prune(bucket).await {
            tracing::debug!(bucket, "dropped idle mount state");
        }
        Ok(())
    }

    pub fn path(&self, name: &str) -> Result<PathBuf, DriverError> {
        let name = VolumeName::parse(name)?;
        Ok(self.lifecycle.resolver().mountpoint(&name))
    }

    /// Acquire the bucket behind `name` and return the volume's mountpoint.
    pub async fn mount(&self, name: &str, id: Option<&str>) -> Result<PathBuf, DriverError> {
        let name = VolumeName::parse(name)?;
        let resolver = self.lifecycle.resolver();
        tracing::info!(
            volume = %name,
            id,
            mountpoint = %resolver.bucket_mountpoint(name.bucket()).display(),
            "mounting volume"
        );

        self.lifecycle.acquire(name.bucket()).await?;
        Ok(resolver.mountpoint(&name))
    }

    pub async fn unmount(&self, name: &str, id: Option<&str>) -> Result<(), DriverError> {
        let name = VolumeName::parse(name)?;
        tracing::info!(
            volume = %name,
            id,
            mountpoint = %self.lifecycle.resolver().bucket_mountpoint(name.bucket()).display(),
            "unmounting volume"
        );

        self.lifecycle.release(name.bucket()).await?;
        Ok(())
    }

    pub fn capabilities(&self) -> Scope {
        Scope::Local
    }

    pub async fn mounts(&self) -> Vec<MountSnapshot> {
        self.lifecycle.mounts().await
    }

    /// Unmount everything still mounted, e.g. on shutdown.
    pub async fn shutdown(&self) {
        self.lifecycle.release_all().await;
    }

    fn info(&self, entry: &VolumeEntry) -> VolumeInfo {
        VolumeInfo {
            name: entry.name.to_string(),
            mountpoint: self.lifecycle.resolver().mountpoint(&entry.name),
            status: None,
        }
    }
}

impl<P: MountProvider> std::fmt::Debug for Driver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("volumes", &self.registry.len())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    InvalidName(#[from] VolumeNameError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
