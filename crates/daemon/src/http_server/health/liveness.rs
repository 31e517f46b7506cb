use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Always answers ok. Used by external healthchecks to see whether the daemon is
/// alive at all; mount failures are reported on the plugin endpoints instead.
#[tracing::instrument]
pub async fn handler() -> Response {
    let msg = serde_json::json!({"status": "ok"});
    (StatusCode::OK, Json(msg)).into_response()
}
