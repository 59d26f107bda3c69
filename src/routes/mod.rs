/**
 * Routes Module
 * API route handlers
 */

pub mod assessments;
pub mod auth;
pub mod blog;
pub mod dashboard;
pub mod health;
pub mod projects;
pub mod rss;
pub mod uploads;

use serde::Deserialize;

use crate::db::Page;
use crate::error::ApiError;
use crate::storage::{Folder, MediaKind, StorageGateway, StoredObject, UploadFile};

/// `?page=&pageSize=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }
}

/// Store one optional file; nothing sent means nothing stored.
pub(crate) async fn upload_optional(
    storage: &StorageGateway,
    file: Option<UploadFile>,
    folder: Folder,
    kind: MediaKind,
) -> Result<Option<StoredObject>, ApiError> {
    match file {
        Some(file) => Ok(Some(storage.upload(&file, folder, kind).await?)),
        None => Ok(None),
    }
}
