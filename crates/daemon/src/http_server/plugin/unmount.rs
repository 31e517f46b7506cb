use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;

use common::prelude::{Driver, MountProvider};

use super::{decode, ErrResponse, MountRequest, PluginError, PluginJson};

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
    body: Bytes,
) -> Result<PluginJson<ErrResponse>, PluginError> {
    let req: MountRequest = decode(&body)?;
    driver.unmount(&req.name, req.id.as_deref()).await?;
    Ok(PluginJson(ErrResponse::default()))
}
