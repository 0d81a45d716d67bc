//! API 路由模块
//!
//! - [`health`] - 健康检查
//! - [`properties`] - 房源 CRUD 与图片调和
//! - [`images`] - 图片读取
//! - [`upload`] - 图片预上传

pub mod health;
pub mod images;
pub mod properties;
pub mod upload;

use axum::Router;

use crate::core::ServerState;

/// 全部路由, 尚未绑定状态和 tower 层
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(properties::router(state))
        .merge(images::router())
        .merge(upload::router(state))
}
