use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
}

/// Health check endpoint
///
/// The model is loaded before the router is built, so a running process
/// always has one.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: true,
    })
}
