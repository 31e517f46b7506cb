use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use super::PluginJson;

pub const VOLUME_DRIVER: &str = "VolumeDriver";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

/// Handshake: tell the engine which plugin APIs we implement.
#[tracing::instrument]
pub async fn handler() -> impl IntoResponse {
    PluginJson(ActivateResponse {
        implements: vec![VOLUME_DRIVER.to_string()],
    })
}
