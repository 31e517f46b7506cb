use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use common::prelude::{Driver, MountProvider, VolumeInfo, VolumeStatus};

use super::{decode, NameRequest, PluginError, PluginJson};

/// A volume as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    pub mountpoint: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VolumeStatus>,
}

impl From<VolumeInfo> for Volume {
    fn from(info: VolumeInfo) -> Self {
        Self {
            name: info.name,
            mountpoint: info.mountpoint,
            status: info.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub err: String,
}

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
    body: Bytes,
) -> Result<PluginJson<GetResponse>, PluginError> {
    let req: NameRequest = decode(&body)?;
    let volume = driver.get(&req.name).await?.map(Volume::from);
    Ok(PluginJson(GetResponse {
        volume,
        err: String::new(),
    }))
}
