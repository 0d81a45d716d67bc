//! Property Image Model

use serde::{Deserialize, Serialize};

/// Image metadata without the payload
///
/// `property_id` is `None` for staged uploads that are not attached to a
/// listing yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ImageSummary {
    pub id: i64,
    pub property_id: Option<i64>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub is_primary: bool,
    pub created_at: i64,
}
