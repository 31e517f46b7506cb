use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use common::prelude::{Driver, MountProvider, Scope};

use super::PluginJson;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    pub scope: Scope,
}

pub async fn handler<P: MountProvider>(
    State(driver): State<Arc<Driver<P>>>,
) -> PluginJson<CapabilitiesResponse> {
    PluginJson(CapabilitiesResponse {
        capabilities: Capabilities {
            scope: driver.capabilities(),
        },
    })
}
