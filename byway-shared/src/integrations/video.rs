/// Playback OTPs from VdoCipher

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://dev.vdocipher.com/api";

/// Lifetime of a playback OTP in seconds
pub const OTP_TTL_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Invalid video configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("Video provider rejected the request with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone)]
pub struct VdoCipherConfig {
    pub api_secret: String,
}

impl VdoCipherConfig {
    /// Reads `VDOCIPHER_API_SECRET`
    pub fn from_env() -> Result<Self, VideoError> {
        let api_secret = env::var("VDOCIPHER_API_SECRET").map_err(|_| {
            VideoError::InvalidConfiguration("VDOCIPHER_API_SECRET is not set".to_string())
        })?;

        Ok(Self { api_secret })
    }
}

/// What the player needs to start playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOtp {
    pub otp: String,
    pub playback_info: String,
}

#[async_trait]
pub trait VideoOtpProvider: Send + Sync {
    async fn generate_otp(&self, video_id: &str) -> Result<VideoOtp, VideoError>;
}

pub struct VdoCipherClient {
    http: reqwest::Client,
    config: VdoCipherConfig,
}

impl VdoCipherClient {
    pub fn new(config: VdoCipherConfig) -> Result<Self, VideoError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl VideoOtpProvider for VdoCipherClient {
    async fn generate_otp(&self, video_id: &str) -> Result<VideoOtp, VideoError> {
        let response = self
            .http
            .post(format!("{}/videos/{}/otp", API_BASE, video_id))
            .header("Accept", "application/json")
            .header("Authorization", format!("Apisecret {}", self.config.api_secret))
            .json(&serde_json::json!({ "ttl": OTP_TTL_SECS }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VideoError::Rejected(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}
