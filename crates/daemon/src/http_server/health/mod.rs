use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use common::prelude::{Driver, MountProvider};

mod liveness;
mod mounts;
mod version;

pub fn router<P: MountProvider>(driver: Arc<Driver<P>>) -> Router {
    Router::new()
        .route("/livez", get(liveness::handler))
        .route("/version", get(version::handler))
        .route("/mounts", get(mounts::handler::<P>))
        .with_state(driver)
}
