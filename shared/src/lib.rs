//! Shared types for the property listing service
//!
//! Models and response bodies exchanged between the listing server and the
//! web frontend. DB row types derive `sqlx::FromRow` behind the `db` feature.

pub mod models;
pub mod response;
pub mod util;

// Re-exports
pub use models::{
    ImageSummary, Property, PropertyFilter, PropertyInput, PropertyStatus, PropertyWithImages,
};
pub use serde::{Deserialize, Serialize};
