use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Plugin clients (and anything asking for JSON) get an `Err` body they can
/// surface; everything else gets plain text.
pub async fn not_found_handler(uri: Uri, headers: HeaderMap) -> Response {
    let wants_json = [header::ACCEPT, header::CONTENT_TYPE].iter().any(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"))
    });

    tracing::debug!(path = %uri.path(), "no route");

    if wants_json {
        let err_msg = serde_json::json!({"Err": format!("{} not found", uri.path())});
        (StatusCode::NOT_FOUND, Json(err_msg)).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "not found",
        )
            .into_response()
    }
}
