//! Legacy image references
//!
//! Older rows store a path string (`/uploads/properties/abc.jpg`,
//! `properties/abc.jpg`, ...) relative to the upload root. Everything that
//! turns such a string into a filesystem path goes through [`resolve`].

use std::io;
use std::path::{Component, Path, PathBuf};

/// Fallback content type when the extension says nothing useful
pub const DEFAULT_MIME: &str = "image/jpeg";

const UPLOADS_PREFIX: &str = "uploads/";

/// Result of a best-effort file removal
#[derive(Debug)]
pub enum DeleteOutcome {
    Removed(PathBuf),
    /// Nothing on disk at the resolved path
    Missing(PathBuf),
    /// Reference failed the traversal guard, nothing was touched
    Rejected,
    Failed(PathBuf, io::Error),
}

/// Resolve a stored reference under `upload_root`.
///
/// Leading slashes and one leading `uploads/` segment are stripped. Returns
/// `None` for empty references, URLs, backslashes and anything that could
/// leave the upload root (`..`, absolute or prefixed components).
pub fn resolve(upload_root: &Path, reference: &str) -> Option<PathBuf> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.contains("://") || trimmed.contains('\\') {
        return None;
    }

    let relative = trimmed.trim_start_matches('/');
    let relative = relative.strip_prefix(UPLOADS_PREFIX).unwrap_or(relative);

    let mut path = upload_root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if depth == 0 { None } else { Some(path) }
}

/// Content type for a legacy file, from its extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => DEFAULT_MIME,
    }
}

/// File extension used when writing new legacy files
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Remove the file behind a reference. Never fails; callers only log the outcome.
pub async fn remove_best_effort(upload_root: &Path, reference: &str) -> DeleteOutcome {
    let Some(path) = resolve(upload_root, reference) else {
        return DeleteOutcome::Rejected;
    };

    match tokio::fs::remove_file(&path).await {
        Ok(()) => DeleteOutcome::Removed(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => DeleteOutcome::Missing(path),
        Err(e) => DeleteOutcome::Failed(path, e),
    }
}

/// Log a [`DeleteOutcome`] with the owning image id
pub fn log_outcome(image_id: i64, reference: &str, outcome: &DeleteOutcome) {
    match outcome {
        DeleteOutcome::Removed(path) => {
            tracing::debug!(image_id, path = %path.display(), "Removed legacy image file");
        }
        DeleteOutcome::Missing(path) => {
            tracing::warn!(image_id, path = %path.display(), "Legacy image file already gone");
        }
        DeleteOutcome::Rejected => {
            tracing::warn!(image_id, reference, "Refusing to delete legacy image outside upload root");
        }
        DeleteOutcome::Failed(path, e) => {
            tracing::warn!(image_id, path = %path.display(), error = %e, "Failed to delete legacy image file");
        }
    }
}
