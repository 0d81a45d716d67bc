//! Upload Intake
//!
//! Decodes multipart bodies into validated [`UploadedImage`]s plus the plain
//! text fields of the form. Limits come from an explicit [`UploadPolicy`].

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::multipart::Field;
use serde_json::{Map, Value};

use super::store::UploadedImage;
use crate::utils::{AppError, AppResult};

/// Default per-file ceiling (5MB)
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Accepted file extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Accepted content types
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Multipart field carrying image files
pub const IMAGES_FIELD: &str = "images";

/// Slack for text fields and multipart framing on top of the file budget
const FORM_OVERHEAD: usize = 1024 * 1024;

/// Limits for one kind of upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_size: usize,
    pub max_files: usize,
}

impl UploadPolicy {
    /// Images sent with a property create/update
    pub fn property_images(max_file_size: usize) -> Self {
        Self {
            max_file_size,
            max_files: 20,
        }
    }

    /// Images staged through `POST /api/upload/images`
    pub fn staged_images(max_file_size: usize) -> Self {
        Self {
            max_file_size,
            max_files: 10,
        }
    }

    /// Request body ceiling for this policy
    pub fn body_limit(&self) -> usize {
        self.max_files
            .saturating_mul(self.max_file_size)
            .saturating_add(FORM_OVERHEAD)
    }

    /// Validate one file and build the upload from it.
    ///
    /// The declared content type wins; without one it is guessed from the
    /// file name. Either way it must agree with the magic bytes.
    pub fn validate(
        &self,
        file_name: Option<&str>,
        declared_type: Option<&str>,
        bytes: Bytes,
    ) -> AppResult<UploadedImage> {
        let label = file_name.unwrap_or("<unnamed>");

        if bytes.is_empty() {
            return Err(AppError::validation(format!("Empty file provided: {label}")));
        }
        if bytes.len() > self.max_file_size {
            return Err(self.too_large(label));
        }

        if let Some(ext) = file_name.and_then(extension_of)
            && !SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        {
            return Err(unsupported(label));
        }

        let mime_type = declared_type
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty() && t != "application/octet-stream")
            .or_else(|| {
                file_name
                    .and_then(|name| mime_guess::from_path(name).first_raw())
                    .map(str::to_string)
            })
            .map(|t| normalize_mime(&t))
            .ok_or_else(|| unsupported(label))?;

        if !SUPPORTED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(unsupported(label));
        }

        let detected = image::guess_format(&bytes)
            .map_err(|_| AppError::validation(format!("Invalid image file: {label}")))?;
        if detected.to_mime_type() != mime_type {
            return Err(AppError::validation(format!(
                "File content of {label} is {} but was sent as {mime_type}",
                detected.to_mime_type()
            )));
        }

        Ok(UploadedImage {
            bytes,
            mime_type,
            file_name: file_name.map(str::to_string),
        })
    }

    fn too_large(&self, label: &str) -> AppError {
        AppError::validation(format!(
            "File {label} too large. Maximum size is {} bytes ({}MB)",
            self.max_file_size,
            self.max_file_size / 1024 / 1024
        ))
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::property_images(MAX_FILE_SIZE)
    }
}

/// Decoded multipart body
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields; repeated names collect into an array
    pub fields: Map<String, Value>,
    /// Validated images in arrival order
    pub images: Vec<UploadedImage>,
}

/// Read the whole multipart body.
///
/// File parts are only accepted under [`IMAGES_FIELD`].
pub async fn read_multipart(mut multipart: Multipart, policy: &UploadPolicy) -> AppResult<MultipartForm> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_none() {
            let text = field.text().await?;
            push_text(&mut form.fields, name, text);
            continue;
        }

        if name != IMAGES_FIELD {
            return Err(AppError::validation(format!(
                "Unexpected file field '{name}', files must be sent as '{IMAGES_FIELD}'"
            )));
        }
        if form.images.len() >= policy.max_files {
            return Err(AppError::validation(format!(
                "Too many files. Maximum is {}",
                policy.max_files
            )));
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = read_limited(field, policy, file_name.as_deref()).await?;
        let image = policy.validate(file_name.as_deref(), content_type.as_deref(), bytes)?;
        form.images.push(image);
    }

    tracing::debug!(
        fields = form.fields.len(),
        images = form.images.len(),
        "Multipart body decoded"
    );
    Ok(form)
}

/// Stream a file part, failing as soon as it exceeds the per-file ceiling
async fn read_limited(
    mut field: Field<'_>,
    policy: &UploadPolicy,
    file_name: Option<&str>,
) -> AppResult<Bytes> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if buffer.len() + chunk.len() > policy.max_file_size {
            return Err(policy.too_large(file_name.unwrap_or("<unnamed>")));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

fn push_text(fields: &mut Map<String, Value>, name: String, text: String) {
    let name = name.strip_suffix("[]").map(str::to_string).unwrap_or(name);
    match fields.get_mut(&name) {
        None => {
            fields.insert(name, Value::String(text));
        }
        Some(Value::Array(items)) => items.push(Value::String(text)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(text)]);
        }
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn normalize_mime(mime_type: &str) -> String {
    match mime_type {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

fn unsupported(label: &str) -> AppError {
    AppError::validation(format!(
        "Unsupported file type for {label}. Only image files are allowed ({})",
        SUPPORTED_EXTENSIONS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";
    const GIF: &[u8] = b"GIF89a\x01\0\x01\0";

    #[test]
    fn test_accepts_declared_and_guessed_types() {
        let policy = UploadPolicy::default();
        let image = policy
            .validate(Some("front.png"), Some("image/png"), Bytes::from_static(PNG))
            .unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.file_name.as_deref(), Some("front.png"));

        let image = policy
            .validate(Some("porch.JPG"), None, Bytes::from_static(JPEG))
            .unwrap();
        assert_eq!(image.mime_type, "image/jpeg");

        let image = policy
            .validate(Some("anim.gif"), Some("application/octet-stream"), Bytes::from_static(GIF))
            .unwrap();
        assert_eq!(image.mime_type, "image/gif");

        let image = policy
            .validate(None, Some("image/jpg"), Bytes::from_static(JPEG))
            .unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_rejects_bad_files() {
        let policy = UploadPolicy::default();
        assert!(policy.validate(Some("doc.pdf"), Some("application/pdf"), Bytes::from_static(b"%PDF-1.4")).is_err());
        assert!(policy.validate(Some("fake.png"), Some("image/png"), Bytes::from_static(JPEG)).is_err());
        assert!(policy.validate(Some("x.png"), Some("image/png"), Bytes::from_static(b"not an image")).is_err());
        assert!(policy.validate(Some("x.png"), Some("image/png"), Bytes::new()).is_err());
        assert!(policy.validate(None, None, Bytes::from_static(PNG)).is_err());
    }

    #[test]
    fn test_size_ceiling() {
        let policy = UploadPolicy {
            max_file_size: PNG.len(),
            max_files: 1,
        };
        assert!(policy.validate(Some("a.png"), None, Bytes::from_static(PNG)).is_ok());

        let mut big = PNG.to_vec();
        big.push(0);
        let err = policy.validate(Some("a.png"), None, Bytes::from(big)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_policies_and_body_limit() {
        let property = UploadPolicy::property_images(MAX_FILE_SIZE);
        let staged = UploadPolicy::staged_images(MAX_FILE_SIZE);
        assert_eq!(property.max_files, 20);
        assert_eq!(staged.max_files, 10);
        assert_eq!(staged.body_limit(), 10 * MAX_FILE_SIZE + 1024 * 1024);
    }

    #[test]
    fn test_push_text_collects_repeats() {
        let mut fields = Map::new();
        push_text(&mut fields, "title".into(), "Loft".into());
        push_text(&mut fields, "images[]".into(), "1".into());
        push_text(&mut fields, "images[]".into(), "2".into());
        push_text(&mut fields, "images[]".into(), "3".into());
        assert_eq!(fields["title"], Value::String("Loft".into()));
        assert_eq!(fields["images"], serde_json::json!(["1", "2", "3"]));
    }
}
