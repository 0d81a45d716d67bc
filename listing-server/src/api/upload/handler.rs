//! Image Upload Handler
//!
//! Stages images before the property they belong to is saved. The returned
//! ids are sent back in the property's `images` field to attach them.

use axum::Json;
use axum::extract::{Multipart, State};
use shared::response::StagedImagesResponse;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::images::intake::read_multipart;
use crate::images::{FileChanges, Placement};
use crate::utils::{AppError, AppResult};

/// POST /api/upload/images
pub async fn upload(
    State(state): State<ServerState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<StagedImagesResponse>> {
    let form = read_multipart(multipart, &state.staged_uploads).await?;
    if form.images.is_empty() {
        return Err(AppError::validation("No files uploaded"));
    }

    let placement = Placement::Staged { uploaded_by: user.id };
    let mut files = FileChanges::new();
    let outcome = async {
        let mut tx = state.db.begin_write().await?;
        let mut ids = Vec::with_capacity(form.images.len());
        for image in &form.images {
            ids.push(state.image_store().put(&mut tx, &mut files, placement, image).await?);
        }
        tx.commit().await?;
        Ok::<_, AppError>(ids)
    }
    .await;
    files.settle(outcome.is_ok()).await;
    let ids = outcome?;

    tracing::info!(user_id = user.id, count = ids.len(), images = ?ids, "Staged image upload");

    Ok(Json(StagedImagesResponse {
        message: "Images uploaded successfully".to_string(),
        images: ids,
    }))
}
