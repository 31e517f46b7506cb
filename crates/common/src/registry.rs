//! Declared volumes, independent of whether anything is mounted.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::volume::VolumeName;

/// A volume the runtime has created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub name: VolumeName,
    /// Options passed at creation. Informational only.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct VolumeRegistry {
    volumes: RwLock<BTreeMap<VolumeName, VolumeEntry>>,
}

impl VolumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        name: VolumeName,
        options: BTreeMap<String, String>,
    ) -> Result<VolumeEntry, RegistryError> {
        let mut volumes = self.volumes.write();
        if volumes.contains_key(&name) {
            return Err(RegistryError::AlreadyExists(name));
        }

        let entry = VolumeEntry {
            name: name.clone(),
            options,
        };
        volumes.insert(name, entry.clone());
        Ok(entry)
    }

    pub fn get(&self, name: &VolumeName) -> Result<VolumeEntry, RegistryError> {
        self.volumes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(name.clone()))
    }

    /// All volumes, ordered by name.
    pub fn list(&self) -> Vec<VolumeEntry> {
        self.volumes.read().values().cloned().collect()
    }

    /// Forget a volume. Removing an unknown name is not an error.
    pub fn remove(&self, name: &VolumeName) -> Option<VolumeEntry> {
        self.volumes.write().remove(name)
    }

    /// Whether any declared volume is backed by `bucket`.
    pub fn references_bucket(&self, bucket: &str) -> bool {
        self.volumes.read().keys().any(|name| name.bucket() == bucket)
    }

    pub fn len(&self) -> usize {
        self.volumes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("volume {0} already exists")]
    AlreadyExists(VolumeName),

    #[error("volume {0} is not registered")]
    NotRegistered(VolumeName),
}
