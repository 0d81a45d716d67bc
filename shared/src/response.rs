//! API response bodies
//!
//! Shapes expected by the web frontend; wrapper keys are camelCase, property
//! fields stay snake_case.

use serde::{Deserialize, Serialize};

use crate::models::PropertyWithImages;

/// `GET /api/properties`
#[derive(Debug, Serialize, Deserialize)]
pub struct PropertyListResponse {
    pub properties: Vec<PropertyWithImages>,
}

/// `GET /api/properties/{id}`
#[derive(Debug, Serialize, Deserialize)]
pub struct PropertyResponse {
    pub property: PropertyWithImages,
}

/// `POST /api/properties`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCreatedResponse {
    pub message: String,
    pub property_id: i64,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `POST /api/upload/images`
#[derive(Debug, Serialize, Deserialize)]
pub struct StagedImagesResponse {
    pub message: String,
    pub images: Vec<i64>,
}
