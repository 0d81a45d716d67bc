//! Server Implementation
//!
//! Starts the HTTP server and its background tasks

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, ServerState};
use crate::services::StagedImageCleanup;
use crate::utils::{AppError, AppResult};

/// Interval between staged-image sweeps
const STAGED_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Bind the state and add the tower-http layers
pub fn build_router(state: ServerState) -> Router {
    crate::api::build_app(&state)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    pub async fn run(&self) -> AppResult<()> {
        let state = self.state.clone();

        let mut tasks = BackgroundTasks::new();
        let cleanup = StagedImageCleanup::new(
            state.db.clone(),
            state.image_store.clone(),
            Duration::from_secs(self.config.staged_image_ttl_secs),
        );
        let token = tasks.shutdown_token();
        tasks.spawn("staged_image_cleanup", TaskKind::Periodic, async move {
            cleanup.run(STAGED_CLEANUP_INTERVAL, token).await;
        });
        tasks.log_summary();

        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!(%addr, environment = %self.config.environment, "Listing server started");

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AppError::internal(format!("HTTP server error: {e}")));

        tasks.shutdown().await;
        served
    }
}
