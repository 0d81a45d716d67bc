//! Staged Image Cleanup
//!
//! Removes uploads that were never attached to a property

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::db::DbService;
use crate::db::repository::{RepoResult, property_image};
use crate::images::{FileChanges, ImageStore};

/// Rows deleted per transaction
const BATCH_SIZE: i64 = 100;

/// Periodically deletes staged uploads older than the TTL
#[derive(Clone)]
pub struct StagedImageCleanup {
    db: DbService,
    store: Arc<dyn ImageStore>,
    ttl: Duration,
}

impl StagedImageCleanup {
    pub fn new(db: DbService, store: Arc<dyn ImageStore>, ttl: Duration) -> Self {
        Self { db, store, ttl }
    }

    /// Sweep every `interval` until cancelled
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::warn!(error = %e, "Staged image cleanup failed");
                    }
                }
            }
        }
    }

    /// Delete expired staged images. Returns how many were removed.
    pub async fn sweep(&self) -> RepoResult<usize> {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = shared::util::now_millis().saturating_sub(ttl_ms);
        let mut removed = 0;

        loop {
            let mut files = FileChanges::new();
            let outcome = self.sweep_batch(&mut files, cutoff).await;
            files.settle(outcome.is_ok()).await;
            let (found, deleted) = outcome?;
            removed += deleted;

            if (found as i64) < BATCH_SIZE {
                break;
            }
        }

        if removed > 0 {
            tracing::info!(count = removed, "Staged images cleaned up");
        }
        Ok(removed)
    }

    /// One transaction: (stale rows found, rows deleted)
    async fn sweep_batch(&self, files: &mut FileChanges, cutoff: i64) -> RepoResult<(usize, usize)> {
        let mut tx = self.db.begin_write().await?;
        let ids = property_image::find_stale_staged(&mut tx, cutoff, BATCH_SIZE).await?;
        let mut deleted = 0;
        for id in &ids {
            if self.store.delete(&mut tx, files, *id).await? {
                deleted += 1;
            }
        }
        tx.commit().await?;
        Ok((ids.len(), deleted))
    }
}
