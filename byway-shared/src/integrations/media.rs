/// Media hosting on Cloudinary
///
/// Uploads and renames are signed: the sorted parameters are joined as
/// `key=value&...`, suffixed with the API secret and hashed with SHA-1.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::models::MediaRef;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid media configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Media request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Media upload rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryConfig {
    /// Reads `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY` and
    /// `CLOUDINARY_API_SECRET`
    pub fn from_env() -> Result<Self, MediaError> {
        let required = |key: &str| {
            env::var(key)
                .map_err(|_| MediaError::InvalidConfiguration(format!("{} is not set", key)))
        };

        Ok(Self {
            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Video,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
        }
    }
}

/// Asset to upload
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Raw file from a multipart form
    File {
        file_name: String,
        content_type: String,
        bytes: Bytes,
    },

    /// `data:image/...;base64,...` string sent in a JSON body
    DataUrl(String),
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub kind: ResourceKind,

    /// Incoming transformation, e.g. `w_500,h_500,c_fill,g_face`
    pub transformation: Option<String>,

    /// Derived versions generated at upload time
    pub eager: Option<String>,
}

impl UploadOptions {
    pub fn image(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            kind: ResourceKind::Image,
            transformation: None,
            eager: None,
        }
    }

    pub fn video(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            kind: ResourceKind::Video,
            transformation: None,
            eager: None,
        }
    }

    pub fn with_transformation(mut self, transformation: impl Into<String>) -> Self {
        self.transformation = Some(transformation.into());
        self
    }

    pub fn with_eager(mut self, eager: impl Into<String>) -> Self {
        self.eager = Some(eager.into());
        self
    }

    /// Parameters covered by the signature, sorted by key
    fn signed_params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if let Some(eager) = &self.eager {
            params.push(("eager", eager.clone()));
        }
        params.push(("folder", self.folder.clone()));
        params.push(("timestamp", timestamp.to_string()));
        if let Some(transformation) = &self.transformation {
            params.push(("transformation", transformation.clone()));
        }
        params
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(
        &self,
        source: MediaSource,
        options: UploadOptions,
    ) -> Result<MediaRef, MediaError>;

    /// Deletes every asset of `kind` whose public id starts with `prefix`
    async fn delete_by_prefix(&self, prefix: &str, kind: ResourceKind) -> Result<(), MediaError>;

    /// Moves an asset to a new full public id
    async fn rename(
        &self,
        from: &str,
        to: &str,
        kind: ResourceKind,
    ) -> Result<MediaRef, MediaError>;
}

/// Hex SHA-1 of the `key=value&...` string followed by the secret
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signed parameters of a rename, sorted by key
fn rename_params(from: &str, to: &str, timestamp: i64) -> Vec<(&'static str, String)> {
    vec![
        ("from_public_id", from.to_string()),
        ("timestamp", timestamp.to_string()),
        ("to_public_id", to.to_string()),
    ]
}

/// Last path segment of a Cloudinary public id
pub fn short_public_id(public_id: &str) -> &str {
    public_id.rsplit('/').next().unwrap_or(public_id)
}

/// Reply to both uploads and renames
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

impl From<UploadResponse> for MediaRef {
    fn from(asset: UploadResponse) -> Self {
        MediaRef {
            public_id: short_public_id(&asset.public_id).to_string(),
            url: asset.secure_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

pub struct CloudinaryStore {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self { http, config })
    }

    async fn rejection(response: reqwest::Response) -> MediaError {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => MediaError::Rejected(body.error.message),
            Err(_) => MediaError::Rejected(format!("status {}", status)),
        }
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(
        &self,
        source: MediaSource,
        options: UploadOptions,
    ) -> Result<MediaRef, MediaError> {
        let timestamp = Utc::now().timestamp();
        let params = options.signed_params(timestamp);
        let signature = sign(&params, &self.config.api_secret);

        let file_part = match source {
            MediaSource::File {
                file_name,
                content_type,
                bytes,
            } => Part::bytes(bytes.to_vec())
                .file_name(file_name)
                .mime_str(&content_type)?,
            MediaSource::DataUrl(data_url) => Part::text(data_url),
        };

        let mut form = Form::new()
            .part("file", file_part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let url = format!(
            "{}/{}/{}/upload",
            API_BASE,
            self.config.cloud_name,
            options.kind.as_str()
        );

        let response = self.http.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(public_id = %uploaded.public_id, "Media uploaded");

        Ok(uploaded.into())
    }

    async fn delete_by_prefix(&self, prefix: &str, kind: ResourceKind) -> Result<(), MediaError> {
        let url = format!(
            "{}/{}/resources/{}/upload",
            API_BASE,
            self.config.cloud_name,
            kind.as_str()
        );

        let response = self
            .http
            .delete(url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&[("prefix", prefix)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        tracing::debug!(prefix, kind = kind.as_str(), "Media deleted by prefix");
        Ok(())
    }

    async fn rename(
        &self,
        from: &str,
        to: &str,
        kind: ResourceKind,
    ) -> Result<MediaRef, MediaError> {
        let params = rename_params(from, to, Utc::now().timestamp());
        let signature = sign(&params, &self.config.api_secret);

        let mut form = vec![
            ("api_key", self.config.api_key.clone()),
            ("signature", signature),
        ];
        form.extend(params);

        let url = format!(
            "{}/{}/{}/rename",
            API_BASE,
            self.config.cloud_name,
            kind.as_str()
        );

        let response = self.http.post(url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let renamed: UploadResponse = response.json().await?;
        tracing::debug!(from, to = %renamed.public_id, "Media renamed");

        Ok(renamed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_documented_example() {
        // Cloudinary's published signing example
        let params = vec![
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
            ("public_id", "sample_image".to_string()),
            ("timestamp", "1315060510".to_string()),
        ];

        assert_eq!(
            sign(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn test_signed_params_are_sorted() {
        let options = UploadOptions::image("byWay/layout")
            .with_transformation("g_face")
            .with_eager("w_640");
        let keys: Vec<_> = options
            .signed_params(1)
            .into_iter()
            .map(|(k, _)| k)
            .collect();

        assert_eq!(keys, vec!["eager", "folder", "timestamp", "transformation"]);
    }

    #[test]
    fn test_rename_params_are_sorted_and_signed() {
        let params = rename_params(
            "byWay/courses/Rust 101/thumbnail/abc",
            "byWay/courses/Rust 201/thumbnail/abc",
            1700000000,
        );
        let keys: Vec<_> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["from_public_id", "timestamp", "to_public_id"]);

        let signature = sign(&params, "secret");
        assert_eq!(signature.len(), 40);
        assert_ne!(signature, sign(&params, "other"));
    }

    #[test]
    fn test_upload_response_keeps_last_segment() {
        let asset = UploadResponse {
            public_id: "byWay/layout/xyz".to_string(),
            secure_url: "https://res.cloudinary.com/byway/image/upload/byWay/layout/xyz.png"
                .to_string(),
        };
        let media = MediaRef::from(asset);
        assert_eq!(media.public_id, "xyz");
        assert!(media.url.ends_with("xyz.png"));
    }

    #[test]
    fn test_short_public_id() {
        assert_eq!(short_public_id("byWay/users/ada/abc123"), "abc123");
        assert_eq!(short_public_id("abc123"), "abc123");
    }
}
