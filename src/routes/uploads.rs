/**
 * Upload Routes
 * Standalone batch uploads (editor image blocks) and best-effort deletes
 */
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{Folder, MediaKind, UploadFile, UploadOutcome};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub folder: Option<String>,
    /// `image` (default) or `attachment`
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadResponse {
    pub results: Vec<UploadOutcome>,
    pub uploaded: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUploadRequest {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUploadResponse {
    pub success: bool,
}

fn parse_kind(raw: Option<&str>) -> Result<MediaKind, ApiError> {
    match raw.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("image") => Ok(MediaKind::Image),
        Some("attachment") => Ok(MediaKind::Attachment),
        Some(other) => Err(ApiError::validation(format!("Unknown upload kind: {other}"))),
    }
}

/// Keys are `{folder}/{name}`; anything else is refused before reaching the store.
fn is_valid_key(key: &str) -> bool {
    let Some((folder, name)) = key.split_once('/') else {
        return false;
    };
    Folder::parse(folder).is_some()
        && !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}

/// POST /api/uploads?folder=projects
pub async fn upload_files(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchUploadResponse>), ApiError> {
    let folder_name = query.folder.unwrap_or_else(|| "blog".to_string());
    let folder = Folder::parse(&folder_name)
        .ok_or_else(|| ApiError::validation(format!("Unknown upload folder: {folder_name}")))?;
    let kind = parse_kind(query.kind.as_deref())?;

    // Fields are read in order so results line up with the request.
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Multipart error: {}", e);
        ApiError::validation("Invalid multipart data")
    })? {
        let Some(original_filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read upload bytes: {}", e);
            ApiError::validation("Failed to read file data")
        })?;
        files.push(UploadFile {
            bytes,
            original_filename,
            mime_type,
        });
    }

    if files.is_empty() {
        return Err(ApiError::validation("No file provided"));
    }

    let results = state.storage.upload_batch(&files, folder, kind).await;
    let uploaded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - uploaded;
    tracing::info!(folder = folder.as_str(), uploaded, failed, "batch upload finished");

    let status = if uploaded > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((
        status,
        Json(BatchUploadResponse {
            results,
            uploaded,
            failed,
        }),
    ))
}

/// DELETE /api/uploads
pub async fn delete_upload(
    State(state): State<AppState>,
    Json(payload): Json<DeleteUploadRequest>,
) -> Result<Json<DeleteUploadResponse>, ApiError> {
    let key = payload.key.trim();
    if !is_valid_key(key) {
        return Err(ApiError::validation("Invalid storage key"));
    }
    let success = state.storage.delete(key).await;
    Ok(Json(DeleteUploadResponse { success }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("projects/0b7c.png"));
        assert!(is_valid_key("assessments/report.pdf"));
        assert!(!is_valid_key("projects/../secrets"));
        assert!(!is_valid_key("other/file.png"));
        assert!(!is_valid_key("blog/"));
        assert!(!is_valid_key("blog/a/b.png"));
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind(None).unwrap(), MediaKind::Image);
        assert_eq!(
            parse_kind(Some("Attachment")).unwrap(),
            MediaKind::Attachment
        );
        assert!(parse_kind(Some("video")).is_err());
    }
}
