//! Copy legacy image files into the database.
//!
//! ```text
//! DATABASE_PATH=./data/listing.db UPLOAD_ROOT=./data/uploads migrate-images
//! ```

use anyhow::Context;
use listing_server::db::DbService;
use listing_server::db::image_migration::migrate_legacy_images;
use listing_server::setup_environment;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = setup_environment();

    let db_path = config.database_path.to_string_lossy().into_owned();
    let db = DbService::new(&db_path)
        .await
        .with_context(|| format!("opening database {db_path}"))?;

    let summary = migrate_legacy_images(&db.pool, &config.upload_root)
        .await
        .context("scanning legacy images")?;

    println!("Image migration complete");
    println!("  total:     {}", summary.total);
    println!("  succeeded: {}", summary.succeeded);
    println!("  failed:    {}", summary.failed);

    if summary.failed > 0 {
        println!("Some images could not be migrated; see the log for details and re-run after fixing them.");
    } else if summary.succeeded > 0 {
        println!(
            "Verify the migrated images, then {} can be removed and the image_url column dropped.",
            config.upload_root.display()
        );
    }

    db.pool.close().await;
    Ok(())
}
