//! Property Image Repository
//!
//! Row-level SQL for `property_images`, shared by both image store backends
//! and the migration runner. Nothing here touches the filesystem or fixes
//! primary flags on its own.

use std::collections::HashMap;

use shared::models::ImageSummary;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::RepoResult;

const SUMMARY_COLUMNS: &str = "id, property_id, mime_type, file_size, is_primary, created_at";

/// Payload columns of a single row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImagePayloadRow {
    pub id: i64,
    pub property_id: Option<i64>,
    pub image_url: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub mime_type: Option<String>,
}

/// Legacy row still waiting for its bytes
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnmigratedImage {
    pub id: i64,
    pub property_id: Option<i64>,
    pub image_url: String,
}

/// Where a new image row belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Part of a property's image set
    Property { property_id: i64, is_primary: bool },
    /// Uploaded ahead of a property save; only `uploaded_by` may attach it
    Staged { uploaded_by: i64 },
}

impl Placement {
    /// `(property_id, is_primary, uploaded_by)` column values
    fn columns(self) -> (Option<i64>, bool, Option<i64>) {
        match self {
            Placement::Property {
                property_id,
                is_primary,
            } => (Some(property_id), is_primary, None),
            Placement::Staged { uploaded_by } => (None, false, Some(uploaded_by)),
        }
    }

    pub fn property_id(self) -> Option<i64> {
        self.columns().0
    }
}

/// Insert a row carrying the bytes inline. Returns the new id.
pub async fn insert_blob(
    conn: &mut SqliteConnection,
    placement: Placement,
    data: &[u8],
    mime_type: &str,
) -> RepoResult<i64> {
    let (property_id, is_primary, uploaded_by) = placement.columns();
    let now = shared::util::now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO property_images (property_id, image_data, mime_type, file_size, is_primary, uploaded_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING id",
    )
    .bind(property_id)
    .bind(data)
    .bind(mime_type)
    .bind(data.len() as i64)
    .bind(is_primary)
    .bind(uploaded_by)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Insert a row referencing a file under the upload root. Returns the new id.
pub async fn insert_reference(
    conn: &mut SqliteConnection,
    placement: Placement,
    image_url: &str,
    mime_type: &str,
    file_size: i64,
) -> RepoResult<i64> {
    let (property_id, is_primary, uploaded_by) = placement.columns();
    let now = shared::util::now_millis();
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO property_images (property_id, image_url, mime_type, file_size, is_primary, uploaded_by, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING id",
    )
    .bind(property_id)
    .bind(image_url)
    .bind(mime_type)
    .bind(file_size)
    .bind(is_primary)
    .bind(uploaded_by)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn find_payload(
    conn: &mut SqliteConnection,
    image_id: i64,
) -> RepoResult<Option<ImagePayloadRow>> {
    let row = sqlx::query_as::<_, ImagePayloadRow>(
        "SELECT id, property_id, image_url, image_data, mime_type FROM property_images WHERE id = ?",
    )
    .bind(image_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Legacy reference of a row. Outer `None` = no such row.
pub async fn find_reference(
    conn: &mut SqliteConnection,
    image_id: i64,
) -> RepoResult<Option<Option<String>>> {
    let row = sqlx::query_scalar::<_, Option<String>>(
        "SELECT image_url FROM property_images WHERE id = ?",
    )
    .bind(image_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// `(id, image_url)` of every image of a property
pub async fn references_for_property(
    conn: &mut SqliteConnection,
    property_id: i64,
) -> RepoResult<Vec<(i64, Option<String>)>> {
    let rows = sqlx::query_as::<_, (i64, Option<String>)>(
        "SELECT id, image_url FROM property_images WHERE property_id = ? ORDER BY id",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn delete_row(conn: &mut SqliteConnection, image_id: i64) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM property_images WHERE id = ?")
        .bind(image_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every image row of a property. Returns the removed ids.
pub async fn delete_for_property(
    conn: &mut SqliteConnection,
    property_id: i64,
) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "DELETE FROM property_images WHERE property_id = ? RETURNING id",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Images of a property, primary first, then insertion order
pub async fn list_for_property(
    conn: &mut SqliteConnection,
    property_id: i64,
) -> RepoResult<Vec<ImageSummary>> {
    let rows = sqlx::query_as::<_, ImageSummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM property_images WHERE property_id = ? ORDER BY is_primary DESC, id ASC"
    ))
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn count_for_property(conn: &mut SqliteConnection, property_id: i64) -> RepoResult<i64> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM property_images WHERE property_id = ?")
            .bind(property_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

/// Attach a staged image uploaded by `uploaded_by` to a property.
/// Returns `false` when the id does not exist, already belongs to a property
/// or was staged by someone else.
pub async fn attach_staged(
    conn: &mut SqliteConnection,
    image_id: i64,
    property_id: i64,
    uploaded_by: i64,
    is_primary: bool,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE property_images SET property_id = ?1, is_primary = ?2 WHERE id = ?3 AND property_id IS NULL AND uploaded_by = ?4",
    )
    .bind(property_id)
    .bind(is_primary)
    .bind(image_id)
    .bind(uploaded_by)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Make `image_id` the only primary image of the property
pub async fn set_primary(
    conn: &mut SqliteConnection,
    property_id: i64,
    image_id: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE property_images SET is_primary = CASE WHEN id = ?1 THEN 1 ELSE 0 END WHERE property_id = ?2",
    )
    .bind(image_id)
    .bind(property_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Image ids for a batch of properties, each list primary first
pub async fn ids_for_properties(
    pool: &SqlitePool,
    property_ids: &[i64],
) -> RepoResult<HashMap<i64, Vec<i64>>> {
    let mut map: HashMap<i64, Vec<i64>> = HashMap::new();
    if property_ids.is_empty() {
        return Ok(map);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT property_id, id FROM property_images WHERE property_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in property_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY property_id, is_primary DESC, id ASC");

    let rows: Vec<(i64, i64)> = qb.build_query_as().fetch_all(pool).await?;
    for (property_id, image_id) in rows {
        map.entry(property_id).or_default().push(image_id);
    }
    Ok(map)
}

/// Staged images created before `cutoff` (unix millis) that were never attached
pub async fn find_stale_staged(
    conn: &mut SqliteConnection,
    cutoff: i64,
    limit: i64,
) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM property_images WHERE property_id IS NULL AND created_at < ? ORDER BY id LIMIT ?",
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Legacy rows with a reference but no bytes yet
pub async fn find_unmigrated(pool: &SqlitePool) -> RepoResult<Vec<UnmigratedImage>> {
    let rows = sqlx::query_as::<_, UnmigratedImage>(
        "SELECT id, property_id, image_url FROM property_images WHERE image_data IS NULL AND image_url IS NOT NULL ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fill in the bytes of a legacy row
pub async fn store_migrated_bytes(
    pool: &SqlitePool,
    image_id: i64,
    data: &[u8],
    mime_type: &str,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE property_images SET image_data = ?1, mime_type = ?2, file_size = ?3 WHERE id = ?4 AND image_data IS NULL",
    )
    .bind(data)
    .bind(mime_type)
    .bind(data.len() as i64)
    .bind(image_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
