/// Request extractors with envelope-shaped rejections
///
/// - [`ApiJson`]: `Json<T>` whose rejection is an [`ApiError`]
/// - [`FormData`]: a fully buffered multipart form with text fields and files
/// - [`parse_id`]: path or body id parsing

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
};
use byway_shared::integrations::MediaSource;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ApiError;

/// JSON body extractor whose rejections render the error envelope
#[derive(Debug, axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Parses a resource id
///
/// # Errors
///
/// `400 Invalid data format...` when `raw` is not a UUID
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::invalid_id())
}

/// A file part of a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_media_source(self) -> MediaSource {
        MediaSource::File {
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

/// Buffered multipart form
///
/// A field name repeated with several files keeps all of them, in order.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn insert_file(&mut self, file: UploadedFile) {
        self.files.entry(file.field.clone()).or_default().push(file);
    }

    /// Text field, `None` when absent or blank
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Text field holding JSON
    ///
    /// # Errors
    ///
    /// 400 when the field is present but not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| ApiError::BadRequest(format!("Invalid {} format: {}", name, e))),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await?;
                    form.insert_file(UploadedFile {
                        field: name,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let value = field.text().await?;
                    form.insert_text(name, value);
                }
            }
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn file(field: &str, content_type: &str) -> UploadedFile {
        UploadedFile {
            field: field.to_string(),
            file_name: "upload.bin".to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from_static(b"abc"),
        }
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);

        let err = parse_id("64f1c2e9a1b2c3d4e5f60718").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_form_data_keeps_repeated_files() {
        let mut form = FormData::default();
        form.insert_file(file("thumbnail", "image/png"));
        form.insert_file(file("thumbnail", "image/jpeg"));

        let thumbnails = form.take_files("thumbnail");
        assert_eq!(thumbnails.len(), 2);
        assert_eq!(thumbnails[1].content_type, "image/jpeg");
        assert!(form.take_files("thumbnail").is_empty());
        assert!(form.take_files("demoVideo").is_empty());
    }

    #[test]
    fn test_form_data_text_and_json() {
        let mut form = FormData::default();
        form.insert_text("name", "Rust 101");
        form.insert_text("blank", "  ");
        form.insert_text("benefits", r#"[{"title": "Traits"}]"#);
        form.insert_text("broken", "[{");

        assert_eq!(form.text("name"), Some("Rust 101"));
        assert_eq!(form.text("blank"), None);

        let benefits: Vec<serde_json::Value> = form.json("benefits").unwrap().unwrap();
        assert_eq!(benefits[0]["title"], "Traits");
        assert!(form.json::<Vec<serde_json::Value>>("missing").unwrap().is_none());
        assert!(form.json::<Vec<serde_json::Value>>("broken").is_err());
    }

    #[test]
    fn test_file_kinds() {
        assert!(file("a", "image/png").is_image());
        assert!(file("a", "video/mp4").is_video());
        assert!(!file("a", "application/pdf").is_image());
        assert!(!file("a", "imagery/x-custom").is_image());
        assert!(!file("a", "videos").is_video());
        assert_eq!(file("a", "video/mp4").size(), 3);
    }
}
