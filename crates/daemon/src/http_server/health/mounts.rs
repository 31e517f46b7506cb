use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::prelude::{Driver, MountProvider};

/// Buckets currently mounted and how many containers share each one.
pub async fn handler<P: MountProvider>(State(driver): State<Arc<Driver<P>>>) -> Response {
    (StatusCode::OK, Json(driver.mounts().await)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::prelude::{MountOptions, MountSnapshot};
    use common::testkit::MockProvider;

    #[tokio::test]
    async fn test_handler_direct() {
        let root = tempfile::tempdir().unwrap();
        let driver = Arc::new(Driver::new(
            root.path(),
            MockProvider::default(),
            MountOptions::default(),
        ));
        driver.mount("photos/2024", None).await.unwrap();
        driver.mount("photos", None).await.unwrap();

        let response = handler(State(driver)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let mounts: Vec<MountSnapshot> = serde_json::from_slice(&body).unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].bucket, "photos");
        assert_eq!(mounts[0].refcount, 2);
        assert_eq!(mounts[0].mountpoint, root.path().join("photos"));
    }
}
