use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use common::prelude::{Driver, MountProvider};

use super::{decode, ErrResponse, PluginError, PluginJson};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateRequest {
    pub name: String,
    /// Driver options from `docker volume create -o`; the engine may send null
    pub opts: Option<BTreeMap<String, String>>,
}

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
    body: Bytes,
) -> Result<PluginJson<ErrResponse>, PluginError> {
    let req: CreateRequest = decode(&body)?;
    driver.create(&req.name, req.opts.unwrap_or_default())?;
    Ok(PluginJson(ErrResponse::default()))
}
