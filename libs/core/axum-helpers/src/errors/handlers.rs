use axum::{http::StatusCode, response::IntoResponse, Json};

use super::ErrorResponse;

/// Fallback handler for unmatched routes.
pub async fn not_found() -> impl IntoResponse {
    let body = ErrorResponse {
        error: "NotFound".to_string(),
        message: "The requested resource was not found".to_string(),
        details: None,
    };

    (StatusCode::NOT_FOUND, Json(body))
}
