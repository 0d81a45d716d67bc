//! Filesystem side effects of an image transaction
//!
//! Rows live in SQLite, legacy bytes live on disk, and only the rows roll
//! back. Stores therefore never unlink a file while the transaction is open:
//! they record it here, together with every file they wrote. Once the
//! transaction has finished, the caller settles the journal:
//!
//! - committed: files of deleted rows are removed
//! - rolled back: files written for the transaction are removed, files of
//!   rows that came back are left alone
//!
//! ```ignore
//! let mut files = FileChanges::new();
//! let outcome = async {
//!     let mut tx = db.begin_write().await?;
//!     store.delete(&mut tx, &mut files, image_id).await?;
//!     tx.commit().await?;
//!     Ok::<_, AppError>(())
//! }
//! .await;
//! files.settle(outcome.is_ok()).await;
//! ```

use std::io;
use std::path::{Path, PathBuf};

use super::legacy_path;

#[derive(Debug)]
struct PendingRemoval {
    image_id: i64,
    reference: String,
    upload_root: PathBuf,
}

/// Files written and files to unlink by one transaction
#[derive(Debug, Default)]
#[must_use = "settle the journal once the transaction has finished"]
pub struct FileChanges {
    written: Vec<PathBuf>,
    removals: Vec<PendingRemoval>,
}

impl FileChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file created for a row of this transaction
    pub fn record_written(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    /// The file behind a row deleted in this transaction
    pub fn unlink_after_commit(&mut self, upload_root: &Path, image_id: i64, reference: &str) {
        self.removals.push(PendingRemoval {
            image_id,
            reference: reference.to_string(),
            upload_root: upload_root.to_path_buf(),
        });
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.removals.is_empty()
    }

    pub async fn settle(self, committed: bool) {
        if committed {
            self.apply().await;
        } else {
            self.discard().await;
        }
    }

    /// The transaction committed: unlink files of deleted rows
    pub async fn apply(self) {
        for removal in self.removals {
            let outcome =
                legacy_path::remove_best_effort(&removal.upload_root, &removal.reference).await;
            legacy_path::log_outcome(removal.image_id, &removal.reference, &outcome);
        }
    }

    /// The transaction rolled back: remove files nothing points at
    pub async fn discard(self) {
        if !self.removals.is_empty() {
            tracing::debug!(count = self.removals.len(), "Keeping image files of rolled back deletions");
        }
        for path in self.written {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Removed image file of rolled back upload");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned image file");
                }
            }
        }
    }
}
