//! Upload Routes

mod handler;

use axum::{Router, extract::DefaultBodyLimit, middleware, routing::post};

use crate::auth::require_auth;
use crate::core::ServerState;

/// Staged image upload - authentication required
pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/upload/images", post(handler::upload))
        .layer(DefaultBodyLimit::max(state.staged_uploads.body_limit()))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
