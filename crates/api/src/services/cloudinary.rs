//! Product image uploads to Cloudinary.
//!
//! Admin uploads arrive as multipart form data. Each file is checked for an
//! allowed image type and size, then sent to Cloudinary's signed upload
//! endpoint. The signature is a SHA-256 over the sorted signed parameters
//! followed by the API secret.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::CloudinaryConfig;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Errors from image uploads.
#[derive(Debug, Error)]
pub enum CloudinaryError {
    /// Cloudinary credentials are not set.
    #[error("image uploads are not configured")]
    NotConfigured,

    /// The file is not an accepted image type.
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    /// The file is empty or too large.
    #[error("image must be between 1 byte and {max} bytes, got {size}")]
    InvalidSize { size: usize, max: usize },

    /// HTTP request failed.
    #[error("upload request failed: {0}")]
    Request(String),

    /// Cloudinary rejected the upload.
    #[error("upload rejected: {0}")]
    Api(String),
}

/// An accepted image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Identify an image from its leading bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// A stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedImage {
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Clone)]
struct Credentials {
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    folder: String,
}

/// Cloudinary upload client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field(
                "cloud_name",
                &self.credentials.as_ref().map(|c| c.cloud_name.as_str()),
            )
            .field("api_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl CloudinaryClient {
    #[must_use]
    pub fn new(client: Client, config: Option<&CloudinaryConfig>) -> Self {
        Self {
            client,
            credentials: config.map(|c| Credentials {
                cloud_name: c.cloud_name.clone(),
                api_key: c.api_key.clone(),
                api_secret: c.api_secret.clone(),
                folder: c.folder.clone(),
            }),
        }
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Upload one image.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` without credentials, `UnsupportedType` or
    /// `InvalidSize` for bad input, and `Request`/`Api` for upload failures.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, CloudinaryError> {
        let creds = self.credentials.as_ref().ok_or(CloudinaryError::NotConfigured)?;
        let kind = validate_image(&bytes)?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [("folder", creds.folder.as_str()), ("timestamp", timestamp.as_str())];
        let signature = sign_params(&params, &creds.api_secret);

        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(kind.mime())
            .map_err(|e| CloudinaryError::Request(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", creds.api_key.clone())
            .text("folder", creds.folder.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            creds.cloud_name
        );
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CloudinaryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorResponse>()
                .await
                .map_or_else(|_| status.to_string(), |e| e.error.message);
            error!(%status, error = %message, "Cloudinary upload failed");
            return Err(CloudinaryError::Api(message));
        }

        let image: UploadedImage = response
            .json()
            .await
            .map_err(|e| CloudinaryError::Api(e.to_string()))?;
        debug!(public_id = %image.public_id, "Image uploaded");
        Ok(image)
    }
}

/// Check size and format of an upload.
///
/// # Errors
///
/// Returns `InvalidSize` or `UnsupportedType`.
pub fn validate_image(bytes: &[u8]) -> Result<ImageKind, CloudinaryError> {
    if bytes.is_empty() || bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CloudinaryError::InvalidSize {
            size: bytes.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }
    ImageKind::sniff(bytes).ok_or_else(|| {
        CloudinaryError::UnsupportedType("expected JPEG, PNG or WebP".to_string())
    })
}

/// Cloudinary request signature: hex SHA-256 of `k1=v1&k2=v2...` sorted by
/// key, with the secret appended.
fn sign_params(params: &[(&str, &str)], secret: &SecretString) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(
            ImageKind::sniff(b"\x89PNG\r\n\x1a\n\0\0"),
            Some(ImageKind::Png)
        );
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"GIF89a"), None);
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        assert!(matches!(
            validate_image(&[]),
            Err(CloudinaryError::InvalidSize { size: 0, .. })
        ));

        let mut big = vec![0xFF, 0xD8, 0xFF];
        big.resize(MAX_UPLOAD_BYTES + 1, 0);
        assert!(matches!(
            validate_image(&big),
            Err(CloudinaryError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_signature_sorts_params() {
        let secret = SecretString::from("abcd");
        let a = sign_params(&[("timestamp", "1315060510"), ("folder", "kirana")], &secret);
        let b = sign_params(&[("folder", "kirana"), ("timestamp", "1315060510")], &secret);
        assert_eq!(a, b);

        let expected = hex::encode(Sha256::digest(b"folder=kirana&timestamp=1315060510abcd"));
        assert_eq!(a, expected);
    }

    #[tokio::test]
    async fn test_not_configured() {
        let client = CloudinaryClient::new(Client::new(), None);
        assert!(matches!(
            client.upload_image("a.png", vec![1, 2, 3]).await,
            Err(CloudinaryError::NotConfigured)
        ));
    }
}
