//! Image Store abstraction
//!
//! Both backends share the `property_images` table and only differ in where
//! the bytes live. Every method takes a connection so it can run inside the
//! caller's transaction.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use shared::models::ImageSummary;
use sqlx::SqliteConnection;

use super::file_changes::FileChanges;
use crate::db::repository::property_image::{self, Placement};
use crate::db::repository::RepoResult;

/// A validated upload waiting to be persisted
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Image payload ready for delivery
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Where new image bytes are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Bytes inline in the `image_data` column
    #[default]
    Database,
    /// Files under the upload root, referenced by `image_url`
    Filesystem,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Database => "database",
            StorageBackend::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" | "blob" => Ok(StorageBackend::Database),
            "filesystem" | "fs" | "file" => Ok(StorageBackend::Filesystem),
            other => Err(format!("unknown image storage backend '{other}'")),
        }
    }
}

/// Persistence of image bytes plus their row
///
/// Stores never touch primary flags beyond what the caller passes in; the
/// reconciler owns that invariant. Filesystem effects are recorded in the
/// caller's [`FileChanges`] and settled after the transaction ends.
#[async_trait]
pub trait ImageStore: Send + Sync {
    fn backend(&self) -> StorageBackend;

    /// Persist an upload into a property's set or as a staged upload
    async fn put(
        &self,
        conn: &mut SqliteConnection,
        files: &mut FileChanges,
        placement: Placement,
        image: &UploadedImage,
    ) -> RepoResult<i64>;

    /// Bytes and content type, `None` when the image (or its bytes) cannot be found
    async fn get(&self, conn: &mut SqliteConnection, image_id: i64)
    -> RepoResult<Option<StoredImage>>;

    /// Delete the row; any file behind it is unlinked once the transaction commits
    async fn delete(
        &self,
        conn: &mut SqliteConnection,
        files: &mut FileChanges,
        image_id: i64,
    ) -> RepoResult<bool>;

    /// Delete every image of a property. Returns the removed ids.
    async fn delete_for_property(
        &self,
        conn: &mut SqliteConnection,
        files: &mut FileChanges,
        property_id: i64,
    ) -> RepoResult<Vec<i64>>;

    async fn list_for_property(
        &self,
        conn: &mut SqliteConnection,
        property_id: i64,
    ) -> RepoResult<Vec<ImageSummary>> {
        property_image::list_for_property(conn, property_id).await
    }

    /// Attach an image staged by `uploaded_by`
    async fn attach_staged(
        &self,
        conn: &mut SqliteConnection,
        image_id: i64,
        property_id: i64,
        uploaded_by: i64,
        is_primary: bool,
    ) -> RepoResult<bool> {
        property_image::attach_staged(conn, image_id, property_id, uploaded_by, is_primary).await
    }

    async fn set_primary(
        &self,
        conn: &mut SqliteConnection,
        property_id: i64,
        image_id: i64,
    ) -> RepoResult<()> {
        property_image::set_primary(conn, property_id, image_id).await
    }
}
