//! Route handlers

pub mod health;
pub mod task;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Failure body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            message: message.into(),
        }),
    )
}

async fn route_not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Route not found")
}

/// Full application router, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(task::router())
        .fallback(route_not_found)
        .with_state(state)
}
