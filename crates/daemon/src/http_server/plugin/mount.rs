use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;

use common::prelude::{Driver, MountProvider};

use super::path::MountpointResponse;
use super::{decode, MountRequest, PluginError, PluginJson};

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
    body: Bytes,
) -> Result<PluginJson<MountpointResponse>, PluginError> {
    let req: MountRequest = decode(&body)?;
    let mountpoint = driver.mount(&req.name, req.id.as_deref()).await?;
    Ok(PluginJson(MountpointResponse::new(mountpoint)))
}
