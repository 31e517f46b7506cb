//! Docker volume plugin protocol
//!
//! Every endpoint is a POST with a (possibly empty) JSON body. Keys are
//! PascalCase on the wire, and failures are reported as HTTP 500 with an
//! `Err` message rather than through status codes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use common::prelude::{Driver, DriverError, MountProvider};

pub mod activate;
pub mod capabilities;
pub mod create;
pub mod get;
pub mod list;
pub mod mount;
pub mod path;
pub mod remove;
pub mod unmount;

pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1+json";

pub fn router<P: MountProvider>(driver: Arc<Driver<P>>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate::handler))
        .route("/VolumeDriver.Create", post(create::handler::<P>))
        .route("/VolumeDriver.Remove", post(remove::handler::<P>))
        .route("/VolumeDriver.Mount", post(mount::handler::<P>))
        .route("/VolumeDriver.Path", post(path::handler::<P>))
        .route("/VolumeDriver.Unmount", post(unmount::handler::<P>))
        .route("/VolumeDriver.Get", post(get::handler::<P>))
        .route("/VolumeDriver.List", post(list::handler::<P>))
        .route(
            "/VolumeDriver.Capabilities",
            post(capabilities::handler::<P>),
        )
        .with_state(driver)
}

/// A JSON body sent with the plugin content type.
#[derive(Debug)]
pub struct PluginJson<T>(pub T);

impl<T: Serialize> IntoResponse for PluginJson<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.0).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PLUGIN_CONTENT_TYPE),
        );
        response
    }
}

/// Body of responses that carry nothing but the error slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrResponse {
    #[serde(default)]
    pub err: String,
}

/// Request body naming a single volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NameRequest {
    pub name: String,
}

/// Request body naming a volume and the container asking for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountRequest {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: Option<String>,
}

/// Decode a request body, treating an empty one as `{}`.
pub(crate) fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, PluginError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("invalid request body: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        tracing::warn!("plugin request failed: {}", self);
        let body = ErrResponse {
            err: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, PluginJson(body)).into_response()
    }
}
