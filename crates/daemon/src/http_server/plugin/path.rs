use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use common::prelude::{Driver, MountProvider};

use super::{decode, NameRequest, PluginError, PluginJson};

/// Shared by Path and Mount: where the volume lives on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountpointResponse {
    pub mountpoint: PathBuf,
    #[serde(default)]
    pub err: String,
}

impl MountpointResponse {
    pub fn new(mountpoint: PathBuf) -> Self {
        Self {
            mountpoint,
            err: String::new(),
        }
    }
}

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
    body: Bytes,
) -> Result<PluginJson<MountpointResponse>, PluginError> {
    let req: NameRequest = decode(&body)?;
    let mountpoint = driver.path(&req.name)?;
    Ok(PluginJson(MountpointResponse::new(mountpoint)))
}
