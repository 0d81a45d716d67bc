//! Image Set Reconciler
//!
//! Applies a client's image instructions and new uploads to the persisted
//! image set of one property, then restores the primary-image invariant:
//! a property with at least one image has exactly one primary image.
//!
//! Callers run this inside a write transaction while holding the property's
//! mutation lock, and settle the [`FileChanges`] once the transaction ends.

use serde::Serialize;
use sqlx::SqliteConnection;

use super::file_changes::FileChanges;
use super::instructions::ImageInstructions;
use super::store::{ImageStore, UploadedImage};
use crate::db::repository::property_image::{self, Placement};
use crate::db::repository::RepoResult;

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Ids deleted from the property
    pub removed: Vec<i64>,
    /// Staged uploads attached to the property
    pub attached: Vec<i64>,
    /// Ids created from this request's uploads, in arrival order
    pub inserted: Vec<i64>,
    /// References that matched nothing this property can use
    pub ignored: Vec<String>,
    /// Primary image after reconciliation
    pub primary: Option<i64>,
}

/// `acting_user` may only attach images they staged themselves.
pub async fn reconcile_images(
    store: &dyn ImageStore,
    conn: &mut SqliteConnection,
    files: &mut FileChanges,
    property_id: i64,
    acting_user: i64,
    instructions: &ImageInstructions,
    uploads: &[UploadedImage],
) -> RepoResult<ReconciliationResult> {
    let mut result = ReconciliationResult::default();

    if instructions.replace_all {
        result.removed = store.delete_for_property(conn, files, property_id).await?;
        for (index, upload) in uploads.iter().enumerate() {
            let placement = Placement::Property {
                property_id,
                is_primary: index == 0,
            };
            result.inserted.push(store.put(conn, files, placement, upload).await?);
        }
    } else {
        let persisted: Vec<i64> = store
            .list_for_property(conn, property_id)
            .await?
            .into_iter()
            .map(|image| image.id)
            .collect();

        // a. explicit removals
        let (remove_ids, invalid) = ImageInstructions::parse_ids(&instructions.remove);
        result.ignored.extend(invalid);
        for id in remove_ids {
            if persisted.contains(&id) && store.delete(conn, files, id).await? {
                result.removed.push(id);
            } else {
                result.ignored.push(id.to_string());
            }
        }

        // b. kept references that are not ours yet must be staged uploads
        let (keep_ids, invalid) = ImageInstructions::parse_ids(&instructions.keep);
        result.ignored.extend(invalid);
        for id in keep_ids {
            if persisted.contains(&id) {
                continue;
            }
            if store
                .attach_staged(conn, id, property_id, acting_user, false)
                .await?
            {
                result.attached.push(id);
            } else {
                result.ignored.push(id.to_string());
            }
        }

        // c. first upload becomes primary only for an empty set
        let existing = property_image::count_for_property(conn, property_id).await?;
        for (index, upload) in uploads.iter().enumerate() {
            let placement = Placement::Property {
                property_id,
                is_primary: existing == 0 && index == 0,
            };
            result.inserted.push(store.put(conn, files, placement, upload).await?);
        }
    }

    result.primary = ensure_single_primary(store, conn, property_id).await?;

    if !result.ignored.is_empty() {
        tracing::warn!(property_id, ignored = ?result.ignored, "Ignored unknown image references");
    }
    tracing::debug!(
        property_id,
        removed = result.removed.len(),
        attached = result.attached.len(),
        inserted = result.inserted.len(),
        primary = ?result.primary,
        "Image set reconciled"
    );

    Ok(result)
}

/// Leave exactly one primary image when the property has any images.
///
/// The first image in display order wins: the lowest-id primary if one
/// exists, otherwise the lowest-id image.
pub async fn ensure_single_primary(
    store: &dyn ImageStore,
    conn: &mut SqliteConnection,
    property_id: i64,
) -> RepoResult<Option<i64>> {
    let images = store.list_for_property(conn, property_id).await?;
    let Some(first) = images.first() else {
        return Ok(None);
    };

    let primaries = images.iter().filter(|image| image.is_primary).count();
    if primaries != 1 || !first.is_primary {
        tracing::info!(
            property_id,
            image_id = first.id,
            previous_primaries = primaries,
            "Repairing primary image flag"
        );
        store.set_primary(conn, property_id, first.id).await?;
    }

    Ok(Some(first.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::images::{BlobImageStore, FileImageStore};
    use shared::models::ImageSummary;
    use sqlx::SqlitePool;

    const AGENT: i64 = 1;

    fn png(tag: u8) -> UploadedImage {
        UploadedImage::new(vec![0x89, b'P', b'N', b'G', tag], "image/png")
    }

    async fn setup() -> (DbService, BlobImageStore, i64) {
        let db = DbService::in_memory().await.unwrap();
        let now = shared::util::now_millis();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO properties (title, property_type, listing_type, price, agent_id, created_at, updated_at) VALUES ('T', 'house', 'sale', 1, 1, ?1, ?1) RETURNING id",
        )
        .bind(now)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        (db, BlobImageStore::new("/nonexistent"), id)
    }

    /// Reconcile outside a transaction, as if it committed right away
    async fn run(
        store: &dyn ImageStore,
        conn: &mut SqliteConnection,
        pid: i64,
        instructions: &ImageInstructions,
        uploads: &[UploadedImage],
    ) -> ReconciliationResult {
        let mut files = FileChanges::new();
        let result = reconcile_images(store, conn, &mut files, pid, AGENT, instructions, uploads)
            .await
            .unwrap();
        files.settle(true).await;
        result
    }

    async fn stage(store: &dyn ImageStore, conn: &mut SqliteConnection, uploaded_by: i64, tag: u8) -> i64 {
        let mut files = FileChanges::new();
        let id = store
            .put(conn, &mut files, Placement::Staged { uploaded_by }, &png(tag))
            .await
            .unwrap();
        files.settle(true).await;
        id
    }

    async fn images(pool: &SqlitePool, property_id: i64) -> Vec<ImageSummary> {
        let mut conn = pool.acquire().await.unwrap();
        property_image::list_for_property(&mut conn, property_id)
            .await
            .unwrap()
    }

    fn keep(ids: &[i64]) -> ImageInstructions {
        ImageInstructions {
            keep: ids.iter().map(i64::to_string).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_upload_on_empty_set_is_primary() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let result = run(&store, &mut conn, pid, &ImageInstructions::default(), &[png(1), png(2)]).await;
        drop(conn);

        let rows = images(&db.pool, pid).await;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_primary);
        assert_eq!(rows[0].id, result.inserted[0]);
        assert!(!rows[1].is_primary);
        assert_eq!(result.primary, Some(result.inserted[0]));
    }

    #[tokio::test]
    async fn test_uploads_onto_existing_set_are_not_primary() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let first = run(&store, &mut conn, pid, &ImageInstructions::default(), &[png(1)]).await;
        let second = run(&store, &mut conn, pid, &keep(&first.inserted), &[png(2), png(3)]).await;
        drop(conn);

        assert!(second.removed.is_empty());
        let rows = images(&db.pool, pid).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|r| r.is_primary).count(), 1);
        assert_eq!(rows[0].id, first.inserted[0]);
    }

    #[tokio::test]
    async fn test_removing_primary_promotes_next() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let created = run(&store, &mut conn, pid, &ImageInstructions::default(), &[png(1), png(2)]).await;
        let (a, b) = (created.inserted[0], created.inserted[1]);

        let instructions = ImageInstructions {
            keep: vec![b.to_string()],
            remove: vec![a.to_string()],
            replace_all: false,
        };
        let result = run(&store, &mut conn, pid, &instructions, &[]).await;
        drop(conn);

        assert_eq!(result.removed, vec![a]);
        assert_eq!(result.primary, Some(b));
        let rows = images(&db.pool, pid).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, b);
        assert!(rows[0].is_primary);
    }

    #[tokio::test]
    async fn test_replace_all_drops_everything_else() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let old = run(&store, &mut conn, pid, &ImageInstructions::default(), &[png(1), png(2)]).await;

        let instructions = ImageInstructions {
            keep: old.inserted.iter().map(i64::to_string).collect(),
            remove: Vec::new(),
            replace_all: true,
        };
        let result = run(&store, &mut conn, pid, &instructions, &[png(3), png(4), png(5)]).await;
        drop(conn);

        assert_eq!(result.removed.len(), 2);
        let rows = images(&db.pool, pid).await;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, result.inserted);
        assert!(rows[0].is_primary);
        assert!(rows[1..].iter().all(|r| !r.is_primary));
    }

    #[tokio::test]
    async fn test_remove_of_foreign_image_is_ignored() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let staged = stage(&store, &mut conn, AGENT, 9).await;

        let instructions = ImageInstructions {
            remove: vec![staged.to_string(), "bogus".into()],
            ..Default::default()
        };
        let result = run(&store, &mut conn, pid, &instructions, &[]).await;

        assert!(result.removed.is_empty());
        assert_eq!(result.ignored, vec!["bogus".to_string(), staged.to_string()]);
        assert!(store.get(&mut conn, staged).await.unwrap().is_some());
        assert_eq!(result.primary, None);
    }

    #[tokio::test]
    async fn test_staged_images_are_attached() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let s1 = stage(&store, &mut conn, AGENT, 1).await;
        let s2 = stage(&store, &mut conn, AGENT, 2).await;

        let mut instructions = keep(&[s1, s2]);
        instructions.keep.push("999".into());
        let result = run(&store, &mut conn, pid, &instructions, &[png(3)]).await;
        drop(conn);

        assert_eq!(result.attached, vec![s1, s2]);
        assert_eq!(result.ignored, vec!["999".to_string()]);
        assert_eq!(result.primary, Some(s1));
        let rows = images(&db.pool, pid).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|r| r.is_primary).count(), 1);
    }

    #[tokio::test]
    async fn test_images_staged_by_someone_else_are_ignored() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let foreign = stage(&store, &mut conn, AGENT + 1, 1).await;

        let result = run(&store, &mut conn, pid, &keep(&[foreign]), &[]).await;
        drop(conn);

        assert!(result.attached.is_empty());
        assert_eq!(result.ignored, vec![foreign.to_string()]);
        assert!(images(&db.pool, pid).await.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_single_primary_repairs_legacy_data() {
        let (db, store, pid) = setup().await;
        let mut conn = db.pool.acquire().await.unwrap();
        let mut ids = Vec::new();
        for is_primary in [false, true, true] {
            let placement = Placement::Property {
                property_id: pid,
                is_primary,
            };
            ids.push(
                property_image::insert_blob(&mut conn, placement, b"x", "image/png")
                    .await
                    .unwrap(),
            );
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        let primary = ensure_single_primary(&store, &mut conn, pid).await.unwrap();
        assert_eq!(primary, Some(b));

        sqlx::query("UPDATE property_images SET is_primary = 0")
            .execute(&mut *conn)
            .await
            .unwrap();
        let primary = ensure_single_primary(&store, &mut conn, pid).await.unwrap();
        assert_eq!(primary, Some(a));
        drop(conn);

        let rows = images(&db.pool, pid).await;
        let flags: Vec<(i64, bool)> = rows.iter().map(|r| (r.id, r.is_primary)).collect();
        assert_eq!(flags, vec![(a, true), (b, false), (c, false)]);
    }

    #[tokio::test]
    async fn test_rolled_back_replace_keeps_files_of_restored_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _, pid) = setup().await;
        let store = FileImageStore::new(dir.path());
        let on_disk = || std::fs::read_dir(dir.path().join("properties")).unwrap().count();

        let mut conn = db.pool.acquire().await.unwrap();
        let created = run(&store, &mut conn, pid, &ImageInstructions::default(), &[png(1), png(2)]).await;
        drop(conn);
        assert_eq!(on_disk(), 2);

        let replace = ImageInstructions {
            replace_all: true,
            ..Default::default()
        };
        let mut files = FileChanges::new();
        let mut tx = db.pool.begin().await.unwrap();
        reconcile_images(&store, &mut tx, &mut files, pid, AGENT, &replace, &[png(3)])
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        files.settle(false).await;

        let mut conn = db.pool.acquire().await.unwrap();
        for id in &created.inserted {
            assert!(store.get(&mut conn, *id).await.unwrap().is_some());
        }
        drop(conn);
        assert_eq!(images(&db.pool, pid).await.len(), 2);
        assert_eq!(on_disk(), 2);
    }

    #[tokio::test]
    async fn test_committed_replace_removes_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _, pid) = setup().await;
        let store = FileImageStore::new(dir.path());
        let on_disk = || std::fs::read_dir(dir.path().join("properties")).unwrap().count();

        let mut conn = db.pool.acquire().await.unwrap();
        run(&store, &mut conn, pid, &ImageInstructions::default(), &[png(1), png(2)]).await;

        let replace = ImageInstructions {
            replace_all: true,
            ..Default::default()
        };
        let result = run(&store, &mut conn, pid, &replace, &[png(3)]).await;
        assert_eq!(result.removed.len(), 2);
        assert!(store.get(&mut conn, result.inserted[0]).await.unwrap().is_some());
        drop(conn);
        assert_eq!(on_disk(), 1);
    }
}
