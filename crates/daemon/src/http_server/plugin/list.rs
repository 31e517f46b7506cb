use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use common::prelude::{Driver, MountProvider};

use super::get::Volume;
use super::PluginJson;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub err: String,
}

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
) -> PluginJson<ListResponse> {
    let volumes = driver.list().into_iter().map(Volume::from).collect();
    PluginJson(ListResponse {
        volumes,
        err: String::new(),
    })
}
