use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use core_config::AppInfo;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// Health check endpoint handler.
///
/// Always returns 200 while the process is running; readiness of
/// downstream dependencies is not checked here.
pub async fn health_handler(State(app_info): State<AppInfo>) -> Response {
    let response = HealthResponse {
        status: "healthy",
        name: app_info.name,
        version: app_info.version,
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Router exposing `/health` for liveness probes.
pub fn health_router(app_info: AppInfo) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(app_info)
}
