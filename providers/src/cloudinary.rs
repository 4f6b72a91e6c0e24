//! Cloudinary image store.
//!
//! Uploads use Cloudinary's signed upload API: the request parameters are
//! sorted, joined as `k=v&k=v`, suffixed with the API secret and hashed with
//! SHA-256. Stored images are scaled down to fit the configured bounds.

use eventday_core::StoredImage;
use eventday_core::environment::{
    BoxFuture, ImageFolder, ImagePayload, ImageStore, UploadConstraints, UploadError,
};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

/// Operator hint shown when Cloudinary rejects the signature.
pub const INVALID_SIGNATURE_HINT: &str = "Your CLOUDINARY_API_SECRET (or API key/cloud name) is incorrect. \
     Update the environment with the exact values from your Cloudinary Dashboard and restart the service.";

/// Operator hint shown when no credentials are configured.
pub const NOT_CONFIGURED_HINT: &str = "Set CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY, and \
     CLOUDINARY_API_SECRET in the environment and restart the service.";

/// Strip whitespace and one pair of wrapping quotes from a credential.
///
/// Copy-pasted `.env` values commonly carry both.
///
/// ```
/// use eventday_providers::cloudinary::normalize_credential;
/// assert_eq!(normalize_credential("  \"abc\" "), "abc");
/// assert_eq!(normalize_credential("'k'"), "k");
/// ```
#[must_use]
pub fn normalize_credential(value: &str) -> String {
    let trimmed = value.trim();
    let trimmed = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    trimmed
        .strip_suffix(['"', '\''])
        .unwrap_or(trimmed)
        .to_string()
}

/// Cloudinary account settings.
#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    /// Account cloud name
    pub cloud_name: String,
    /// API key
    pub api_key: String,
    /// API secret
    pub api_secret: String,
    /// Root folder for every upload (e.g. `zappy`)
    pub folder_root: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// API base URL, overridable for tests
    pub api_base: String,
}

impl CloudinaryConfig {
    /// Settings with normalised credentials and default base URL.
    #[must_use]
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            cloud_name: normalize_credential(cloud_name),
            api_key: normalize_credential(api_key),
            api_secret: normalize_credential(api_secret),
            folder_root: "zappy".to_string(),
            timeout: Duration::from_secs(30),
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }

    /// Override the root folder.
    #[must_use]
    pub fn with_folder_root(mut self, root: impl Into<String>) -> Self {
        self.folder_root = root.into();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Image store backed by Cloudinary.
#[derive(Clone, Debug)]
pub struct CloudinaryImageStore {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryImageStore {
    /// Build the store and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Misconfigured`] if a credential is blank or the
    /// HTTP client cannot be built.
    pub fn new(config: CloudinaryConfig) -> Result<Self, UploadError> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty()
        {
            return Err(UploadError::Misconfigured {
                message: "Cloudinary is not configured".to_string(),
                remediation: NOT_CONFIGURED_HINT.to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UploadError::Misconfigured {
                message: format!("Failed to build HTTP client: {e}"),
                remediation: "Check the TLS configuration of the host".to_string(),
            })?;
        Ok(Self { config, client })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    async fn send(
        &self,
        payload: ImagePayload,
        folder: ImageFolder,
        constraints: UploadConstraints,
    ) -> Result<StoredImage, UploadError> {
        let folder = folder.path(&self.config.folder_root);
        let transformation = transformation(constraints);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("folder", folder.as_str()),
                ("timestamp", timestamp.as_str()),
                ("transformation", transformation.as_str()),
            ],
            &self.config.api_secret,
        );

        let mut part = Part::bytes(payload.bytes)
            .file_name(payload.file_name.unwrap_or_else(|| "upload".to_string()));
        if let Some(content_type) = payload.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| UploadError::Rejected {
                    message: format!("Unsupported content type: {e}"),
                    remediation: None,
                })?;
        }
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.clone())
            .text("transformation", transformation)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::Transient("Image upload timed out".to_string())
                } else {
                    UploadError::Transient(format!("Image store unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let body: UploadResponse = response
                .json()
                .await
                .map_err(|e| UploadError::Transient(format!("Malformed upload response: {e}")))?;
            debug!(folder = %folder, public_id = %body.public_id, "Image stored");
            return Ok(StoredImage {
                url: body.secure_url,
                id: body.public_id,
            });
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map_or_else(|_| status.to_string(), |b| b.error.message);
        warn!(status = %status, message = %message, "Cloudinary rejected upload");
        Err(classify(status, message))
    }
}

fn classify(status: StatusCode, message: String) -> UploadError {
    if status == StatusCode::UNAUTHORIZED || message.contains("Invalid Signature") {
        UploadError::Rejected {
            message: format!("Cloudinary upload failed (invalid signature): {message}"),
            remediation: Some(INVALID_SIGNATURE_HINT.to_string()),
        }
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        UploadError::Transient(message)
    } else {
        UploadError::Rejected {
            message,
            remediation: None,
        }
    }
}

/// `c_limit` transformation fitting the image inside the constraints.
fn transformation(constraints: UploadConstraints) -> String {
    format!(
        "c_limit,h_{},w_{}",
        constraints.max_height, constraints.max_width
    )
}

/// Signature over sorted `params` and the API secret.
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{:x}", Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

impl ImageStore for CloudinaryImageStore {
    fn upload(
        &self,
        payload: ImagePayload,
        folder: ImageFolder,
        constraints: UploadConstraints,
    ) -> BoxFuture<'_, Result<StoredImage, UploadError>> {
        Box::pin(self.send(payload, folder, constraints))
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

/// Image store used when no credentials are configured.
///
/// Every upload fails with [`UploadError::Misconfigured`] so the vendor gets
/// an actionable message instead of a crash at startup.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredImageStore;

impl ImageStore for UnconfiguredImageStore {
    fn upload(
        &self,
        _payload: ImagePayload,
        _folder: ImageFolder,
        _constraints: UploadConstraints,
    ) -> BoxFuture<'_, Result<StoredImage, UploadError>> {
        Box::pin(async {
            Err(UploadError::Misconfigured {
                message: "Cloudinary is not configured".to_string(),
                remediation: NOT_CONFIGURED_HINT.to_string(),
            })
        })
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}
