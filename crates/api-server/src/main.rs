//! API Server for the todo service
//!
//! Serves the task REST API. The storage backend is resolved once here and
//! injected into every handler through `AppState`.

mod config;
mod routes;
mod state;
mod validation;

use std::net::SocketAddr;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_api=debug,todo_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Environment: {}", config.environment);

    let task_store = todo_core::open_repository(&config.storage)
        .await
        .context("Failed to initialize task storage")?;
    tracing::info!("Storage backend: {}", task_store.kind());

    let app = routes::router(AppState::new(task_store, config.environment.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server is running on port {}", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}
