//! Data models
//!
//! Shared between listing-server and frontend (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY).

pub mod property;
pub mod property_image;
pub mod serde_helpers;

// Re-exports
pub use property::*;
pub use property_image::*;
