//! Image Delivery
//!
//! `GET /api/images/{id}` serves the stored bytes with their content type.
//! Public route; image ids are not secret.

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};
use http::header;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// Images never change once stored
const CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/images/{id}", get(serve_image))
}

async fn serve_image(State(state): State<ServerState>, Path(id): Path<String>) -> AppResult<Response> {
    let image_id = id
        .parse::<i64>()
        .map_err(|_| AppError::not_found(format!("Image {id} not found")))?;

    let mut conn = state.pool().acquire().await?;
    let image = state
        .image_store()
        .get(&mut conn, image_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Image {image_id} not found")))?;

    Ok((
        [
            (header::CONTENT_TYPE, image.mime_type),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        image.bytes,
    )
        .into_response())
}
