//! Object Storage Gateway
//!
//! Accepts uploaded buffers, validates type and size, writes them under
//! `{folder}/{uuid}.{ext}` and hands back the public URL and storage key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, memory::InMemory, path::Path, ObjectStore};
use serde::Serialize;
use uuid::Uuid;

use crate::config::StorageConfig;

/// 10 MiB per file
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

const ATTACHMENT_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/markdown",
    "application/zip",
    "application/json",
];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File too large ({size} bytes). Maximum size is 10MB.")]
    TooLarge { size: usize },
    #[error("Empty file")]
    Empty,
    #[error("File content does not match declared type {0}")]
    ContentMismatch(String),
    #[error("storage backend error: {0}")]
    Backend(#[from] object_store::Error),
}

impl StorageError {
    /// True for failures caused by the file itself rather than the backend.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, StorageError::Backend(_))
    }
}

/// Logical folder an upload is namespaced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Projects,
    Blog,
    Assessments,
}

impl Folder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Folder::Projects => "projects",
            Folder::Blog => "blog",
            Folder::Assessments => "assessments",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "projects" => Some(Folder::Projects),
            "blog" => Some(Folder::Blog),
            "assessments" => Some(Folder::Assessments),
            _ => None,
        }
    }
}

/// Which allow-list applies to an upload slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    /// Images plus documents; used for assessment attachments.
    Attachment,
}

/// A file taken from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub original_filename: String,
    pub mime_type: String,
}

impl UploadFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub url: String,
    pub key: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size: usize,
}

/// Per-file result of a batch upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub success: bool,
    pub original_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<StoredObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/markdown" => "md",
        "application/zip" => "zip",
        "application/json" => "json",
        _ => "bin",
    }
}

/// Extension of the original filename when it is short and alphanumeric,
/// otherwise one derived from the MIME type.
fn extension_for(file: &UploadFile) -> String {
    file.original_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| extension_for_mime(&file.mime_type).to_string())
}

/// Check type, size and (for images) magic bytes.
pub fn validate(file: &UploadFile, kind: MediaKind) -> Result<(), StorageError> {
    let mime = file.mime_type.to_ascii_lowercase();
    let is_image = IMAGE_TYPES.contains(&mime.as_str());
    let allowed = match kind {
        MediaKind::Image => is_image,
        MediaKind::Attachment => is_image || ATTACHMENT_TYPES.contains(&mime.as_str()),
    };
    if !allowed {
        return Err(StorageError::UnsupportedType(file.mime_type.clone()));
    }
    if file.size() == 0 {
        return Err(StorageError::Empty);
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(StorageError::TooLarge { size: file.size() });
    }
    if is_image && sniff_image(&file.bytes) != Some(mime.as_str()) {
        return Err(StorageError::ContentMismatch(mime));
    }
    Ok(())
}

#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl std::fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field("store", &self.store.to_string())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl StorageGateway {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// S3 bucket when one is configured, otherwise an in-memory store.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let Some(bucket) = &config.bucket else {
            tracing::warn!("S3_BUCKET_NAME not set. Uploads are kept in memory only.");
            return Ok(Self::in_memory(config.public_base_url()));
        };

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&config.region);
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        tracing::info!("Object storage configured for bucket {}", bucket);
        Ok(Self::new(Arc::new(builder.build()?), config.public_base_url()))
    }

    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), public_base_url)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Validate and store one file.
    pub async fn upload(
        &self,
        file: &UploadFile,
        folder: Folder,
        kind: MediaKind,
    ) -> Result<StoredObject, StorageError> {
        validate(file, kind)?;

        let key = format!("{}/{}.{}", folder.as_str(), Uuid::new_v4(), extension_for(file));
        self.store
            .put(&Path::from(key.as_str()), file.bytes.clone().into())
            .await
            .inspect_err(|e| tracing::error!("Failed to store {}: {}", key, e))?;

        tracing::info!(
            key = %key,
            size = file.size(),
            mime = %file.mime_type,
            "file uploaded"
        );

        Ok(StoredObject {
            url: self.public_url(&key),
            key,
            original_filename: file.original_filename.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size(),
        })
    }

    /// Upload each file independently; one result per input, same order.
    pub async fn upload_batch(
        &self,
        files: &[UploadFile],
        folder: Folder,
        kind: MediaKind,
    ) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let outcome = match self.upload(file, folder, kind).await {
                Ok(stored) => UploadOutcome {
                    success: true,
                    original_filename: file.original_filename.clone(),
                    file: Some(stored),
                    error: None,
                },
                Err(e) => UploadOutcome {
                    success: false,
                    original_filename: file.original_filename.clone(),
                    file: None,
                    error: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Batch upload where any single failure fails the whole set.
    pub async fn upload_all(
        &self,
        files: &[UploadFile],
        folder: Folder,
        kind: MediaKind,
    ) -> Result<Vec<StoredObject>, StorageError> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            stored.push(self.upload(file, folder, kind).await?);
        }
        Ok(stored)
    }

    /// Best-effort delete. Failures are logged and reported as `false`.
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(&Path::from(key)).await {
            Ok(()) => {
                tracing::info!("Deleted stored object {}", key);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to delete stored object {}: {}", key, e);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.store.head(&Path::from(key)).await.is_ok()
    }

    pub async fn health_check(&self) -> Result<Duration, StorageError> {
        let start = Instant::now();
        self.store.list_with_delimiter(None).await?;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn png(name: &str) -> UploadFile {
        UploadFile {
            bytes: Bytes::from_static(PNG_HEADER),
            original_filename: name.to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    fn gateway() -> StorageGateway {
        StorageGateway::in_memory("https://cdn.example/")
    }

    #[test]
    fn test_validate_rejects_disallowed_type() {
        let file = UploadFile {
            bytes: Bytes::from_static(b"<html></html>"),
            original_filename: "page.html".to_string(),
            mime_type: "text/html".to_string(),
        };
        assert!(matches!(
            validate(&file, MediaKind::Image),
            Err(StorageError::UnsupportedType(_))
        ));
        assert!(matches!(
            validate(&file, MediaKind::Attachment),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_file() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.resize(MAX_FILE_SIZE + 1, 0);
        let file = UploadFile {
            bytes: Bytes::from(bytes),
            original_filename: "big.png".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(matches!(
            validate(&file, MediaKind::Image),
            Err(StorageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_mismatched_magic_bytes() {
        let file = UploadFile {
            bytes: Bytes::from_static(PNG_HEADER),
            original_filename: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
        };
        assert!(matches!(
            validate(&file, MediaKind::Image),
            Err(StorageError::ContentMismatch(_))
        ));
    }

    #[test]
    fn test_attachment_accepts_pdf_but_image_slot_does_not() {
        let file = UploadFile {
            bytes: Bytes::from_static(b"%PDF-1.7"),
            original_filename: "brief.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        };
        assert!(validate(&file, MediaKind::Attachment).is_ok());
        assert!(validate(&file, MediaKind::Image).is_err());
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        assert_eq!(extension_for(&png("shot.PNG")), "png");
        assert_eq!(extension_for(&png("no-extension")), "png");
        assert_eq!(extension_for(&png("weird.p/n g")), "png");
    }

    #[tokio::test]
    async fn test_upload_writes_under_folder_and_returns_url() {
        let gateway = gateway();
        let stored = gateway
            .upload(&png("hero.png"), Folder::Projects, MediaKind::Image)
            .await
            .unwrap();
        assert!(stored.key.starts_with("projects/"));
        assert!(stored.key.ends_with(".png"));
        assert_eq!(stored.url, format!("https://cdn.example/{}", stored.key));
        assert!(gateway.exists(&stored.key).await);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let bad = UploadFile {
            bytes: Bytes::from_static(b"nope"),
            original_filename: "bad.exe".to_string(),
            mime_type: "application/x-msdownload".to_string(),
        };
        let files = vec![png("a.png"), bad, png("c.png")];
        let outcomes = gateway()
            .upload_batch(&files, Folder::Blog, MediaKind::Image)
            .await;
        let flags: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(outcomes[2].original_filename, "c.png");
        assert!(outcomes[1].error.is_some());
    }

    #[tokio::test]
    async fn test_upload_all_fails_on_any_bad_file() {
        let files = vec![
            png("a.png"),
            UploadFile {
                bytes: Bytes::new(),
                original_filename: "empty.png".to_string(),
                mime_type: "image/png".to_string(),
            },
        ];
        let result = gateway()
            .upload_all(&files, Folder::Assessments, MediaKind::Image)
            .await;
        assert!(matches!(result, Err(StorageError::Empty)));
    }

    #[tokio::test]
    async fn test_delete_is_best_effort() {
        let gateway = gateway();
        let stored = gateway
            .upload(&png("x.png"), Folder::Blog, MediaKind::Image)
            .await
            .unwrap();
        assert!(gateway.delete(&stored.key).await);
        assert!(!gateway.exists(&stored.key).await);
    }

    #[tokio::test]
    async fn test_health_check_in_memory() {
        assert!(gateway().health_check().await.is_ok());
    }
}
