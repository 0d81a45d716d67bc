//! Health check route
//!
//! ```json
//! { "status": "ok", "version": "0.1.0", "storage": "database" }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::images::StorageBackend;

/// Health route, public
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    pub status: &'static str,
    pub version: &'static str,
    pub storage: StorageBackend,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let status = match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check database query failed");
            "degraded"
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage: state.image_store().backend(),
    })
}
