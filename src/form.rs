//! Multipart form reader for entity create/update requests.
//!
//! Scalar fields are plain text, structured fields are JSON strings and
//! file fields become [`UploadFile`]s.

use std::collections::HashMap;

use axum::extract::Multipart;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::storage::UploadFile;

#[derive(Debug, Default)]
pub struct EntityForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadFile>>,
}

impl EntityForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = EntityForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!("Multipart error: {}", e);
            ApiError::validation("Invalid multipart data")
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(original_filename) => {
                    let mime_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        tracing::warn!("Failed to read upload bytes: {}", e);
                        ApiError::validation("Failed to read file data")
                    })?;
                    // Browsers send an empty part when no file was picked.
                    if original_filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.insert_file(
                        &name,
                        UploadFile {
                            bytes,
                            original_filename,
                            mime_type,
                        },
                    );
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        tracing::warn!("Failed to read form field {}: {}", name, e);
                        ApiError::validation("Invalid form field")
                    })?;
                    form.insert_text(&name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn insert_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn insert_file(&mut self, name: &str, file: UploadFile) {
        self.files.entry(name.to_string()).or_default().push(file);
    }

    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn required_text(&self, name: &str, label: &str) -> Result<String, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::validation(format!("{label} is required")))
    }

    /// Integer value; blank or unparseable counts as absent.
    pub fn int(&self, name: &str) -> Option<i32> {
        self.text(name).and_then(|v| v.parse().ok())
    }

    /// Decode a JSON field. Missing, blank or malformed input yields `None`;
    /// malformed input is logged.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let raw = self.text(name)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(field = name, error = %e, "malformed JSON form field, using default");
                None
            }
        }
    }

    /// Like [`EntityForm::json`], falling back to `T::default()` (an empty list for arrays).
    pub fn json_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        self.json(name).unwrap_or_default()
    }

    /// Remove and return every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// First file under the first of `names` that has one.
    pub fn take_file(&mut self, names: &[&str]) -> Option<UploadFile> {
        names
            .iter()
            .find_map(|name| self.files.remove(*name).and_then(|files| files.into_iter().next()))
    }

    /// `publishedAt`: blank → `None`, otherwise a timestamp.
    pub fn published_at(&self, name: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| ApiError::validation(format!("Invalid date: {raw}"))),
        }
    }
}

/// Accepts RFC 3339, `datetime-local` input (`2024-05-01T10:30`) or a bare date.
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tech {
        name: String,
    }

    #[test]
    fn test_text_trims_and_treats_blank_as_missing() {
        let mut form = EntityForm::default();
        form.insert_text("title", "  Demo App ");
        form.insert_text("subtitle", "   ");
        assert_eq!(form.text("title").as_deref(), Some("Demo App"));
        assert_eq!(form.text("subtitle"), None);
        assert!(form.required_text("subtitle", "Subtitle").is_err());
    }

    #[test]
    fn test_malformed_json_defaults_to_empty() {
        let mut form = EntityForm::default();
        form.insert_text("technologies", "[{\"name\": \"React\"");
        let techs: Vec<Tech> = form.json_or_default("technologies");
        assert!(techs.is_empty());
        assert!(form.json::<Tech>("missing").is_none());
    }

    #[test]
    fn test_json_array_parses() {
        let mut form = EntityForm::default();
        form.insert_text("technologies", r#"[{"name":"React"},{"name":"Rust"}]"#);
        let techs: Vec<Tech> = form.json_or_default("technologies");
        assert_eq!(techs.len(), 2);
        assert_eq!(techs[1], Tech { name: "Rust".to_string() });
    }

    #[test]
    fn test_take_file_prefers_first_name() {
        let mut form = EntityForm::default();
        form.insert_file(
            "heroImage",
            UploadFile {
                bytes: Bytes::from_static(b"x"),
                original_filename: "a.png".to_string(),
                mime_type: "image/png".to_string(),
            },
        );
        let file = form.take_file(&["mainImage", "heroImage"]).unwrap();
        assert_eq!(file.original_filename, "a.png");
        assert!(form.take_file(&["heroImage"]).is_none());
    }

    #[test]
    fn test_published_at_variants() {
        let mut form = EntityForm::default();
        form.insert_text("publishedAt", "");
        assert_eq!(form.published_at("publishedAt").unwrap(), None);

        form.insert_text("publishedAt", "2024-05-01T10:30");
        let ts = form.published_at("publishedAt").unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:30:00+00:00");

        form.insert_text("publishedAt", "2024-05-01T10:30:00+02:00");
        let ts = form.published_at("publishedAt").unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T08:30:00+00:00");

        form.insert_text("publishedAt", "2024-05-01");
        assert!(form.published_at("publishedAt").unwrap().is_some());

        form.insert_text("publishedAt", "yesterday");
        assert!(form.published_at("publishedAt").is_err());
    }
}
