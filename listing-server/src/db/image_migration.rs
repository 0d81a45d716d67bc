//! One-shot image migration: copy legacy image files into the database.
//!
//! Rows that only carry an `image_url` get their file read from the upload
//! root and stored inline. The reference column is left in place; dropping
//! it is a manual step once the migrated data has been verified.

use std::path::Path;

use serde::Serialize;
use sqlx::SqlitePool;

use super::repository::{RepoError, RepoResult, property_image};
use crate::images::legacy_path;

/// Counts for one migration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Migrate every legacy row. Per-image failures are logged and counted.
///
/// Safe to re-run: migrated rows no longer match the scan.
pub async fn migrate_legacy_images(pool: &SqlitePool, upload_root: &Path) -> RepoResult<MigrationSummary> {
    let pending = property_image::find_unmigrated(pool).await?;
    let mut summary = MigrationSummary {
        total: pending.len(),
        ..Default::default()
    };

    if pending.is_empty() {
        tracing::info!("No legacy images to migrate");
        return Ok(summary);
    }

    tracing::info!(count = pending.len(), upload_root = %upload_root.display(), "Migrating legacy images");

    for image in pending {
        match migrate_one(pool, upload_root, image.id, &image.image_url).await {
            Ok(size) => {
                summary.succeeded += 1;
                tracing::info!(image_id = image.id, property_id = ?image.property_id, size, "Migrated image");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    image_id = image.id,
                    property_id = ?image.property_id,
                    reference = %image.image_url,
                    error = %e,
                    "Failed to migrate image"
                );
            }
        }
    }

    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Image migration finished"
    );
    Ok(summary)
}

async fn migrate_one(pool: &SqlitePool, upload_root: &Path, image_id: i64, reference: &str) -> RepoResult<usize> {
    let path = legacy_path::resolve(upload_root, reference)
        .ok_or_else(|| RepoError::Validation(format!("Reference outside upload root: {reference}")))?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| RepoError::Storage(format!("{}: {e}", path.display())))?;
    let mime_type = legacy_path::mime_for_path(&path);

    if !property_image::store_migrated_bytes(pool, image_id, &data, mime_type).await? {
        return Err(RepoError::NotFound(format!("Image {image_id} changed during migration")));
    }
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::images::{BlobImageStore, ImageStore};

    async fn legacy_row(db: &DbService, reference: &str) -> i64 {
        let mut conn = db.pool.acquire().await.unwrap();
        let placement = property_image::Placement::Staged { uploaded_by: 1 };
        property_image::insert_reference(&mut conn, placement, reference, "image/jpeg", 0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrates_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("properties")).await.unwrap();
        tokio::fs::write(dir.path().join("properties/a.png"), b"png-bytes").await.unwrap();
        tokio::fs::write(dir.path().join("properties/b.noext"), b"raw").await.unwrap();

        let db = DbService::in_memory().await.unwrap();
        let a = legacy_row(&db, "/uploads/properties/a.png").await;
        let b = legacy_row(&db, "properties/b.noext").await;
        legacy_row(&db, "/uploads/properties/missing.jpg").await;
        legacy_row(&db, "../secret.jpg").await;

        let summary = migrate_legacy_images(&db.pool, dir.path()).await.unwrap();
        assert_eq!(
            summary,
            MigrationSummary {
                total: 4,
                succeeded: 2,
                failed: 2
            }
        );

        let store = BlobImageStore::new(dir.path());
        let mut conn = db.pool.acquire().await.unwrap();
        let stored = store.get(&mut conn, a).await.unwrap().unwrap();
        assert_eq!(&stored.bytes[..], b"png-bytes");
        assert_eq!(stored.mime_type, "image/png");
        let stored = store.get(&mut conn, b).await.unwrap().unwrap();
        assert_eq!(stored.mime_type, "image/jpeg");

        // Reference survives for manual cleanup
        let reference = property_image::find_reference(&mut conn, a).await.unwrap().flatten();
        assert_eq!(reference.as_deref(), Some("/uploads/properties/a.png"));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("properties")).await.unwrap();
        tokio::fs::write(dir.path().join("properties/a.jpg"), b"jpeg").await.unwrap();

        let db = DbService::in_memory().await.unwrap();
        legacy_row(&db, "properties/a.jpg").await;

        let first = migrate_legacy_images(&db.pool, dir.path()).await.unwrap();
        assert_eq!(first.succeeded, 1);

        let second = migrate_legacy_images(&db.pool, dir.path()).await.unwrap();
        assert_eq!(second, MigrationSummary::default());
    }
}
