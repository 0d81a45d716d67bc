//! 核心模块 - 服务器配置、状态和后台任务
//!
//! - [`Config`] - 服务器配置
//! - [`ServerState`] - 服务器状态
//! - [`Server`] - HTTP 服务器
//! - [`BackgroundTasks`] - 后台任务管理

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use server::{Server, build_router};
pub use state::{PropertyLocks, ServerState};
pub use tasks::{BackgroundTasks, TaskKind};
