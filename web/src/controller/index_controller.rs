use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// GET /
pub async fn index() -> impl IntoResponse {
    Json(json!({ "message": "Hello World!" }))
}

/// Fallback for every unmatched route.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" })))
}
