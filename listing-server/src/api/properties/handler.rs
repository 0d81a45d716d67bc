//! 房源 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use shared::models::{Property, PropertyFilter, PropertyWithImages};
use shared::response::{MessageResponse, PropertyCreatedResponse, PropertyListResponse, PropertyResponse};
use sqlx::SqliteConnection;

use super::payload::PropertyPayload;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::repository::{property, property_image};
use crate::images::{FileChanges, reconcile_images};
use crate::security_log;
use crate::utils::{AppError, AppResult};

/// GET /api/properties - 房源列表 (可筛选)
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<PropertyFilter>,
) -> AppResult<Json<PropertyListResponse>> {
    let properties = property::find_all(state.pool(), &filter).await?;
    let ids: Vec<i64> = properties.iter().map(|p| p.id).collect();
    let mut image_ids = property_image::ids_for_properties(state.pool(), &ids).await?;

    let properties = properties
        .into_iter()
        .map(|property| {
            let images = image_ids.remove(&property.id).unwrap_or_default();
            PropertyWithImages { property, images }
        })
        .collect();

    Ok(Json(PropertyListResponse { properties }))
}

/// GET /api/properties/{id} - 单个房源
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PropertyResponse>> {
    let property: Property = property::find_by_id(state.pool(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Property {id} not found")))?;
    let images = property_image::ids_for_properties(state.pool(), &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();

    Ok(Json(PropertyResponse {
        property: PropertyWithImages { property, images },
    }))
}

/// POST /api/properties - 创建房源 (agent / admin)
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    payload: PropertyPayload,
) -> AppResult<(StatusCode, Json<PropertyCreatedResponse>)> {
    let mut files = FileChanges::new();
    let outcome = async {
        let mut tx = state.db.begin_write().await?;
        let property_id = property::create(&mut tx, &payload.input, user.id).await?;
        let result = reconcile_images(
            state.image_store(),
            &mut tx,
            &mut files,
            property_id,
            user.id,
            &payload.instructions,
            &payload.uploads,
        )
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>((property_id, result))
    }
    .await;
    files.settle(outcome.is_ok()).await;
    let (property_id, result) = outcome?;

    tracing::info!(
        property_id,
        agent_id = user.id,
        images = result.inserted.len() + result.attached.len(),
        "Property created"
    );

    Ok((
        StatusCode::CREATED,
        Json(PropertyCreatedResponse {
            message: "Property created successfully".to_string(),
            property_id,
        }),
    ))
}

/// PUT /api/properties/{id} - 更新房源及其图片
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    user: CurrentUser,
    payload: PropertyPayload,
) -> AppResult<Json<MessageResponse>> {
    let _guard = state.property_locks.acquire(id).await;

    let mut files = FileChanges::new();
    let outcome = async {
        let mut tx = state.db.begin_write().await?;
        ensure_can_manage(&mut tx, &user, id).await?;

        property::update(&mut tx, id, &payload.input).await?;
        let result = reconcile_images(
            state.image_store(),
            &mut tx,
            &mut files,
            id,
            user.id,
            &payload.instructions,
            &payload.uploads,
        )
        .await?;
        tx.commit().await?;
        Ok::<_, AppError>(result)
    }
    .await;
    files.settle(outcome.is_ok()).await;
    let result = outcome?;

    tracing::info!(
        property_id = id,
        user_id = user.id,
        removed = result.removed.len(),
        attached = result.attached.len(),
        inserted = result.inserted.len(),
        "Property updated"
    );

    Ok(Json(MessageResponse::new("Property updated successfully")))
}

/// DELETE /api/properties/{id} - 删除房源及其全部图片
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    user: CurrentUser,
) -> AppResult<Json<MessageResponse>> {
    {
        let _guard = state.property_locks.acquire(id).await;

        let mut files = FileChanges::new();
        let outcome = async {
            let mut tx = state.db.begin_write().await?;
            ensure_can_manage(&mut tx, &user, id).await?;

            let images = state.image_store().delete_for_property(&mut tx, &mut files, id).await?;
            property::delete(&mut tx, id).await?;
            tx.commit().await?;
            Ok::<_, AppError>(images)
        }
        .await;
        files.settle(outcome.is_ok()).await;
        let images = outcome?;

        tracing::info!(property_id = id, user_id = user.id, images = images.len(), "Property deleted");
    }
    state.property_locks.forget(id);

    Ok(Json(MessageResponse::new("Property deleted successfully")))
}

/// 房源不存在返回 404, 非所有者且非管理员返回 403
async fn ensure_can_manage(conn: &mut SqliteConnection, user: &CurrentUser, id: i64) -> AppResult<()> {
    let owner = property::find_owner(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Property {id} not found")))?;

    if !user.can_manage(owner) {
        security_log!(
            "WARN",
            "property_access_denied",
            user_id = user.id,
            property_id = id,
            owner_id = owner
        );
        return Err(AppError::forbidden("Not authorized to modify this property"));
    }
    Ok(())
}
