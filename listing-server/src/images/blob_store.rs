//! Database-backed image store (default)

use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use sqlx::SqliteConnection;

use super::file_changes::FileChanges;
use super::legacy_path::DEFAULT_MIME;
use super::store::{ImageStore, StorageBackend, StoredImage, UploadedImage};
use crate::db::repository::property_image::{self, Placement};
use crate::db::repository::RepoResult;

/// Keeps bytes, content type and length inline in `property_images`.
///
/// New images never touch the filesystem. `upload_root` is only used to clean
/// up files left behind by rows that were not migrated yet.
#[derive(Debug, Clone)]
pub struct BlobImageStore {
    upload_root: PathBuf,
}

impl BlobImageStore {
    pub fn new(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
        }
    }

    fn remove_leftover(&self, files: &mut FileChanges, image_id: i64, reference: Option<&str>) {
        if let Some(reference) = reference {
            files.unlink_after_commit(&self.upload_root, image_id, reference);
        }
    }
}

#[async_trait]
impl ImageStore for BlobImageStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Database
    }

    async fn put(
        &self,
        conn: &mut SqliteConnection,
        _files: &mut FileChanges,
        placement: Placement,
        image: &UploadedImage,
    ) -> RepoResult<i64> {
        let id = property_image::insert_blob(conn, placement, &image.bytes, &image.mime_type).await?;
        tracing::debug!(
            image_id = id,
            property_id = ?placement.property_id(),
            size = image.len(),
            "Stored image blob"
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

        match row.image_data {
            Some(data) => Ok(Some(StoredImage {
                bytes: Bytes::from(data),
                mime_type: row.mime_type.unwrap_or_else(|| DEFAULT_MIME.to_string()),
            })),
            None => {
                tracing::warn!(
                    image_id,
                    reference = ?row.image_url,
                    "Image has no inline data; run migrate-images"
                );
                Ok(None)
            }
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
            self.remove_leftover(files, image_id, reference.as_deref());
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
            self.remove_leftover(files, image_id, reference.as_deref());
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    const STAGED: Placement = Placement::Staged { uploaded_by: 1 };

    #[tokio::test]
    async fn test_put_get_preserves_bytes_and_type() {
        let db = DbService::in_memory().await.unwrap();
        let store = BlobImageStore::new("/nonexistent");
        let mut conn = db.pool.acquire().await.unwrap();
        let mut files = FileChanges::new();

        let image = UploadedImage::new(vec![0x89, b'P', b'N', b'G', 1, 2, 3], "image/png");
        let id = store.put(&mut conn, &mut files, STAGED, &image).await.unwrap();
        assert!(files.is_empty());

        let stored = store.get(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(stored.bytes, image.bytes);
        assert_eq!(stored.mime_type, "image/png");
        assert!(store.get(&mut conn, id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unmigrated_row_is_not_served() {
        let db = DbService::in_memory().await.unwrap();
        let store = BlobImageStore::new("/nonexistent");
        let mut conn = db.pool.acquire().await.unwrap();

        let id = property_image::insert_reference(&mut conn, STAGED, "/uploads/properties/a.jpg", "image/jpeg", 3)
            .await
            .unwrap();
        assert!(store.get(&mut conn, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_leftover_legacy_file_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("properties").join("old.jpg");
        tokio::fs::create_dir_all(file.parent().unwrap()).await.unwrap();
        tokio::fs::write(&file, b"jpg").await.unwrap();

        let db = DbService::in_memory().await.unwrap();
        let store = BlobImageStore::new(dir.path());
        let mut conn = db.pool.acquire().await.unwrap();
        let mut files = FileChanges::new();

        let id = property_image::insert_reference(&mut conn, STAGED, "/uploads/properties/old.jpg", "image/jpeg", 3)
            .await
            .unwrap();
        assert!(store.delete(&mut conn, &mut files, id).await.unwrap());
        assert!(file.exists());
        assert!(!store.delete(&mut conn, &mut files, id).await.unwrap());
        assert_eq!(files.pending_removals(), 1);

        files.settle(true).await;
        assert!(!file.exists());
    }
}
