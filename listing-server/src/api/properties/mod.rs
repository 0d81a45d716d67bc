//! Property API 模块
//!
//! | 路径 | 方法 | 认证 |
//! |------|------|------|
//! | /api/properties | GET | 无 |
//! | /api/properties | POST | agent / admin |
//! | /api/properties/{id} | GET | 无 |
//! | /api/properties/{id} | PUT, DELETE | agent / admin, 且为房源所有者或 admin |

mod handler;
pub mod payload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};

use crate::auth::{Role, require_auth, require_role};
use crate::core::ServerState;

const MANAGER_ROLES: &[Role] = &[Role::Admin, Role::Agent];

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new().nest("/api/properties", public_routes().merge(protected_routes(state)))
}

fn public_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
}

fn protected_routes(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", put(handler::update).delete(handler::delete))
        .layer(DefaultBodyLimit::max(state.property_uploads.body_limit()))
        .route_layer(middleware::from_fn(require_role(MANAGER_ROLES)))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
