//! Filesystem-backed image store (legacy layout)

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use sqlx::SqliteConnection;

use super::file_changes::FileChanges;
use super::legacy_path;
use super::store::{ImageStore, StorageBackend, StoredImage, UploadedImage};
use crate::db::repository::property_image::{self, Placement};
use crate::db::repository::{RepoError, RepoResult};

/// Sub-directory of the upload root holding listing images
const PROPERTIES_DIR: &str = "properties";

/// Writes bytes to `{upload_root}/properties/{uuid}.{ext}` and stores the
/// relative reference in `image_url`.
///
/// Rows that already carry inline data (migrated rows) are served from the
/// database. New files are journaled in [`FileChanges`] so a rolled back
/// transaction does not leave them behind.
#[derive(Debug, Clone)]
pub struct FileImageStore {
    upload_root: PathBuf,
}

impl FileImageStore {
    pub fn new(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    fn unlink_later(&self, files: &mut FileChanges, image_id: i64, reference: Option<&str>) {
        if let Some(reference) = reference {
            files.unlink_after_commit(&self.upload_root, image_id, reference);
        }
    }
}

#[async_trait]
impl ImageStore for FileImageStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Filesystem
    }

    async fn put(
        &self,
        conn: &mut SqliteConnection,
        files: &mut FileChanges,
        placement: Placement,
        image: &UploadedImage,
    ) -> RepoResult<i64> {
        let dir = self.upload_root.join(PROPERTIES_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            legacy_path::extension_for_mime(&image.mime_type)
        );
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &image.bytes).await?;
        files.record_written(path.clone());

        let reference = format!("{PROPERTIES_DIR}/{file_name}");
        let id = property_image::insert_reference(
            conn,
            placement,
            &reference,
            &image.mime_type,
            image.len() as i64,
        )
        .await?;

        tracing::debug!(
            image_id = id,
            property_id = ?placement.property_id(),
            path = %path.display(),
            "Stored image file"
        );
        Ok(id)
    }

    async fn get(
        &self,
        conn: &mut SqliteConnection,
        image_id: i64,
    ) -> RepoResult<Option<StoredImage>> {
        let Some(row) = property_image::find_payload(conn, image_id).await? else {
            return Ok(None);
        };

        if let Some(data) = row.image_data {
            return Ok(Some(StoredImage {
                bytes: Bytes::from(data),
                mime_type: row
                    .mime_type
                    .unwrap_or_else(|| legacy_path::DEFAULT_MIME.to_string()),
            }));
        }

        let Some(reference) = row.image_url else {
            return Ok(None);
        };
        let Some(path) = legacy_path::resolve(&self.upload_root, &reference) else {
            tracing::warn!(image_id, reference, "Image reference rejected by path guard");
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(data) => {
                let mime_type = row
                    .mime_type
                    .unwrap_or_else(|| legacy_path::mime_for_path(&path).to_string());
                Ok(Some(StoredImage {
                    bytes: Bytes::from(data),
                    mime_type,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(image_id, path = %path.display(), "Image file missing");
                Ok(None)
            }
            Err(e) => Err(RepoError::Storage(format!(
                "Failed to read image {image_id}: {e}"
            ))),
        }
    }

    async fn delete(
        &self,
        conn: &mut SqliteConnection,
        files: &mut FileChanges,
        image_id: i64,
    ) -> RepoResult<bool> {
        let Some(reference) = property_image::find_reference(conn, image_id).await? else {
            return Ok(false);
        };
        let deleted = property_image::delete_row(conn, image_id).await?;
        if deleted {
            self.unlink_later(files, image_id, reference.as_deref());
        }
        Ok(deleted)
    }

    async fn delete_for_property(
        &self,
        conn: &mut SqliteConnection,
        files: &mut FileChanges,
        property_id: i64,
    ) -> RepoResult<Vec<i64>> {
        let references = property_image::references_for_property(conn, property_id).await?;
        let deleted = property_image::delete_for_property(conn, property_id).await?;
        for (image_id, reference) in references {
            self.unlink_later(files, image_id, reference.as_deref());
        }
        Ok(deleted)
    }
}
