//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    success: bool,
    message: String,
    timestamp: String,
    environment: String,
    version: String,
    storage: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Server is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.environment().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.task_store().kind().to_string(),
    })
}

/// Legacy liveness probe
async fn ok() -> &'static str {
    "ok"
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ok", get(ok))
}
