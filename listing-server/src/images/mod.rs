//! Property image lifecycle
//!
//! - [`store`] - `ImageStore` trait shared by both backends
//! - [`blob_store`] / [`file_store`] - database and legacy filesystem backends
//! - [`legacy_path`] - reference resolution with traversal guard
//! - [`file_changes`] - file writes and removals settled after the transaction
//! - [`instructions`] - client image instructions, normalized
//! - [`reconciler`] - applies instructions + uploads to a property's image set
//! - [`intake`] - multipart decoding and upload validation

pub mod blob_store;
pub mod file_changes;
pub mod file_store;
pub mod instructions;
pub mod intake;
pub mod legacy_path;
pub mod reconciler;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

pub use crate::db::repository::property_image::Placement;
pub use blob_store::BlobImageStore;
pub use file_changes::FileChanges;
pub use file_store::FileImageStore;
pub use instructions::ImageInstructions;
pub use intake::{MultipartForm, UploadPolicy};
pub use reconciler::{ReconciliationResult, ensure_single_primary, reconcile_images};
pub use store::{ImageStore, StorageBackend, StoredImage, UploadedImage};

/// Build the configured image store
pub fn build_store(backend: StorageBackend, upload_root: impl Into<PathBuf>) -> Arc<dyn ImageStore> {
    match backend {
        StorageBackend::Database => Arc::new(BlobImageStore::new(upload_root)),
        StorageBackend::Filesystem => Arc::new(FileImageStore::new(upload_root)),
    }
}
