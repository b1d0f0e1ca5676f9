use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware;
use axum::{Router, routing::get};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use super::utils::{expose_error_details, handle_panic, not_found};
use crate::api::state::{AppState, SharedState};
use crate::core::AppConfig;

async fn root() -> &'static str {
    "CaseCrux API Running"
}

pub fn app(shared_state: SharedState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(root))
        .nest("/chat", routes::chat::router())
        // API routes
        .nest("/api", routes::router())
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&shared_state),
            expose_error_details,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// Run the server
pub async fn serve(host: &str, port: &str, config: AppConfig) -> Result<()> {
    let app_state = AppState::from_config(config);
    let app = app(Arc::new(app_state));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::debug!("Server started. Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
