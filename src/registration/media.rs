//! Payment image upload to a Cloudinary-compatible image host

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::UploadConfig;
use crate::registration::form::PaymentImage;

#[derive(Error, Debug)]
pub enum UploadFailure {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image host rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Image host response had no secure_url")]
    MissingUrl,
}

/// Stores an image somewhere public and hands back its URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, image: PaymentImage, folder: &str) -> Result<String, UploadFailure>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CloudinaryUploader {
    client: reqwest::Client,
    config: UploadConfig,
}

impl CloudinaryUploader {
    pub fn new(config: UploadConfig) -> Result<Self, UploadFailure> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        info!(
            "Image uploader initialized for cloud '{}' (folder {})",
            config.cloud_name, config.folder
        );

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }
}

/// Signs the upload parameters: sorted `key=value` pairs joined by `&`, then the secret.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by_key(|(key, _)| *key);
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(&self, image: PaymentImage, folder: &str) -> Result<String, UploadFailure> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", folder), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let file_name = image
            .file_name
            .clone()
            .unwrap_or_else(|| "payment".to_string());
        let mut part = Part::bytes(image.bytes).file_name(file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self.client.post(self.endpoint()).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(UploadFailure::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let url = response
            .json::<UploadResponse>()
            .await?
            .secure_url
            .filter(|url| !url.is_empty())
            .ok_or(UploadFailure::MissingUrl)?;

        debug!("Uploaded payment image to {}", url);
        Ok(url)
    }
}
