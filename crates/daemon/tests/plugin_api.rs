//! Plugin protocol tests against the full router, backed by the in-memory
//! mount provider.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use bucketvol_daemon::http_server::{self, plugin::PLUGIN_CONTENT_TYPE};
use common::prelude::{Driver, MountOptions};
use common::testkit::MockProvider;

fn setup() -> (Router, Arc<Driver<MockProvider>>, TempDir) {
    let root = TempDir::new().unwrap();
    let driver = Arc::new(Driver::new(
        root.path(),
        MockProvider::default(),
        MountOptions::default(),
    ));
    (http_server::router(driver.clone()), driver, root)
}

async fn post(router: &Router, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::ACCEPT, "application/vnd.docker.plugins.v1.2+json")
        .body(body)
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_activate() {
    let (router, _driver, _root) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/Plugin.Activate")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        PLUGIN_CONTENT_TYPE
    );
}

#[tokio::test]
async fn test_capabilities() {
    let (router, _driver, _root) = setup();

    let (status, body) = post(&router, "/VolumeDriver.Capabilities", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Capabilities": {"Scope": "local"}}));
}

#[tokio::test]
async fn test_create_get_list() {
    let (router, _driver, root) = setup();

    let (status, body) = post(
        &router,
        "/VolumeDriver.Create",
        Some(json!({"Name": "photos/2024", "Opts": {"tier": "cold"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Err": ""}));

    let (status, body) = post(&router, "/VolumeDriver.Get", Some(json!({"Name": "photos/2024"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Err"], "");
    assert_eq!(body["Volume"]["Name"], "photos/2024");
    assert_eq!(
        body["Volume"]["Mountpoint"],
        root.path().join("photos/2024").display().to_string()
    );
    assert_eq!(body["Volume"]["Status"]["bucket"], "photos");
    assert_eq!(body["Volume"]["Status"]["consumers"], 0);
    assert_eq!(body["Volume"]["Status"]["options"]["tier"], "cold");

    let (status, body) = post(&router, "/VolumeDriver.List", None).await;
    assert_eq!(status, StatusCode::OK);
    let volumes = body["Volumes"].as_array().unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0]["Name"], "photos/2024");
    assert!(volumes[0].get("Status").is_none());
}

#[tokio::test]
async fn test_create_with_null_opts() {
    let (router, _driver, _root) = setup();

    let (status, body) = post(
        &router,
        "/VolumeDriver.Create",
        Some(json!({"Name": "photos", "Opts": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Err": ""}));
}

#[tokio::test]
async fn test_duplicate_create_is_error() {
    let (router, _driver, _root) = setup();

    post(&router, "/VolumeDriver.Create", Some(json!({"Name": "photos"}))).await;
    let (status, body) = post(&router, "/VolumeDriver.Create", Some(json!({"Name": "photos"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["Err"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_unknown_volume_omits_volume() {
    let (router, _driver, _root) = setup();

    let (status, body) = post(&router, "/VolumeDriver.Get", Some(json!({"Name": "nope"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Err": ""}));
}

#[tokio::test]
async fn test_mount_unmount_cycle() {
    let (router, driver, root) = setup();
    let mountpoint = root.path().join("photos");

    post(&router, "/VolumeDriver.Create", Some(json!({"Name": "photos"}))).await;

    for id in ["c1", "c2"] {
        let (status, body) = post(
            &router,
            "/VolumeDriver.Mount",
            Some(json!({"Name": "photos", "ID": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Mountpoint"], mountpoint.display().to_string());
        assert_eq!(body["Err"], "");
    }
    assert_eq!(driver.lifecycle().provider().mounts(), 1);

    let (status, body) = post(&router, "/VolumeDriver.Path", Some(json!({"Name": "photos"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Mountpoint"], mountpoint.display().to_string());

    for id in ["c1", "c2"] {
        let (status, _) = post(
            &router,
            "/VolumeDriver.Unmount",
            Some(json!({"Name": "photos", "ID": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(driver.lifecycle().provider().unmounts(), 1);
    assert!(!mountpoint.exists());

    let (status, body) = post(
        &router,
        "/VolumeDriver.Unmount",
        Some(json!({"Name": "photos", "ID": "c3"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["Err"], "unable to find volume mounted for bucket photos");
}

#[tokio::test]
async fn test_mount_failure_reports_err() {
    let (router, driver, _root) = setup();
    driver.lifecycle().provider().fail_next_mount();

    let (status, body) = post(&router, "/VolumeDriver.Mount", Some(json!({"Name": "photos"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["Err"].as_str().unwrap().is_empty());
    assert_eq!(driver.lifecycle().refcount("photos").await, 0);
}

#[tokio::test]
async fn test_remove_while_mounted() {
    let (router, driver, _root) = setup();

    post(&router, "/VolumeDriver.Create", Some(json!({"Name": "photos"}))).await;
    post(&router, "/VolumeDriver.Mount", Some(json!({"Name": "photos"}))).await;

    let (status, body) = post(&router, "/VolumeDriver.Remove", Some(json!({"Name": "photos"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Err": ""}));

    let (_, body) = post(&router, "/VolumeDriver.Get", Some(json!({"Name": "photos"}))).await;
    assert!(body.get("Volume").is_none());
    assert_eq!(driver.lifecycle().refcount("photos").await, 1);
    assert_eq!(driver.lifecycle().provider().unmounts(), 0);
}

#[tokio::test]
async fn test_empty_body_is_treated_as_empty_object() {
    let (router, _driver, _root) = setup();

    let (status, body) = post(&router, "/VolumeDriver.Create", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["Err"].as_str().unwrap().contains("empty"));

    let (status, body) = post(&router, "/VolumeDriver.Get", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Err": ""}));
}

#[tokio::test]
async fn test_malformed_body_is_error() {
    let (router, _driver, _root) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/VolumeDriver.Create")
        .body(Body::from("{\"Name\":"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_route() {
    let (router, _driver, _root) = setup();

    let (status, body) = post(&router, "/VolumeDriver.Snapshot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["Err"], "/VolumeDriver.Snapshot not found");
}

#[tokio::test]
async fn test_status_routes() {
    let (router, driver, _root) = setup();
    driver.mount("photos", None).await.unwrap();

    let request = Request::builder()
        .uri("/_status/livez")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/_status/mounts")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mounts: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(mounts[0]["bucket"], "photos");
    assert_eq!(mounts[0]["refcount"], 1);
}
