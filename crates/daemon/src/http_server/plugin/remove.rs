use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;

use common::prelude::{Driver, MountProvider};

use super::{decode, ErrResponse, NameRequest, PluginError, PluginJson};

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
    body: Bytes,
) -> Result<PluginJson<ErrResponse>, PluginError> {
    let req: NameRequest = decode(&body)?;
    driver.remove(&req.name).await?;
    Ok(PluginJson(ErrResponse::default()))
}
