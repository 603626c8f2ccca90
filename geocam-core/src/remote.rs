//! Verification through the external decode service.
//!
//! [`VerificationService`] is implemented both by [`RemoteVerifier`], which
//! posts the image to `{base_url}/api/verify-image`, and by the in-process
//! [`VerificationEngine`]. Requests are sent once; there are no retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::carrier::ImageInput;
use crate::contract::{VerifyImageRequest, VerifyImageResponse};
use crate::error::{GeoCamError, Result};
use crate::verify::VerificationEngine;

/// Default decode service URL.
pub const DEFAULT_VERIFY_URL: &str = "http://localhost:5000";

/// Path of the verification endpoint.
pub const VERIFY_IMAGE_PATH: &str = "/api/verify-image";

/// Anything that can answer a verification request.
#[async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify_image(&self, request: &VerifyImageRequest) -> Result<VerifyImageResponse>;

    /// Human-readable name of the service for logs.
    fn service_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct RemoteVerifierConfig {
    /// Service base URL, without the endpoint path.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RemoteVerifierConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("GEOCAM_VERIFY_URL")
                .unwrap_or_else(|_| DEFAULT_VERIFY_URL.to_string()),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for a remote decode service.
pub struct RemoteVerifier {
    client: Client,
    endpoint: String,
}

impl RemoteVerifier {
    pub fn new() -> Result<Self> {
        Self::with_config(RemoteVerifierConfig::default())
    }

    #[instrument(level = "debug", skip_all, fields(base_url = %config.base_url))]
    pub fn with_config(config: RemoteVerifierConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeoCamError::HostFailure(format!("Failed to create HTTP client: {e}")))?;
        let endpoint = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            VERIFY_IMAGE_PATH
        );
        debug!(endpoint = %endpoint, "Created remote verifier");
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VerificationService for RemoteVerifier {
    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint))]
    async fn verify_image(&self, request: &VerifyImageRequest) -> Result<VerifyImageResponse> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Verification service returned an error status");
            return Err(GeoCamError::HostFailure(format!(
                "verification service returned status {status}"
            )));
        }

        let body: VerifyImageResponse = response.json().await?;
        info!(success = body.success, "Remote verification finished");
        Ok(body)
    }

    fn service_name(&self) -> &str {
        "remote"
    }
}

#[async_trait]
impl VerificationService for Arc<VerificationEngine> {
    async fn verify_image(&self, request: &VerifyImageRequest) -> Result<VerifyImageResponse> {
        let image = request.decode_image()?;
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = engine.verify(&ImageInput::from_bytes(image.as_slice()));
            VerifyImageResponse::from_result(&result, &image)
        })
        .await
        .map_err(|e| GeoCamError::HostFailure(e.to_string()))
    }

    fn service_name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let verifier = RemoteVerifier::with_config(RemoteVerifierConfig {
            base_url: "http://example.test:5000/".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(verifier.endpoint(), "http://example.test:5000/api/verify-image");
    }

    #[tokio::test]
    async fn test_local_service_reports_absence() {
        let service: Arc<VerificationEngine> = Arc::new(VerificationEngine::new());
        let request = VerifyImageRequest::from_image_bytes(b"not an image");

        let response = service.verify_image(&request).await.unwrap();
        assert!(!response.success);
        assert_eq!(
            response.verification_result.unwrap().message,
            crate::verify::NO_PAYLOAD_MESSAGE
        );
        assert_eq!(service.service_name(), "local");
    }

    #[tokio::test]
    async fn test_local_service_rejects_bad_base64() {
        let service = Arc::new(VerificationEngine::new());
        let request = VerifyImageRequest {
            image_base64: "!!".into(),
        };
        assert!(matches!(
            service.verify_image(&request).await,
            Err(GeoCamError::ImageLoadFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_http_error() {
        let verifier = RemoteVerifier::with_config(RemoteVerifierConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let request = VerifyImageRequest::from_image_bytes(b"x");
        assert!(matches!(
            verifier.verify_image(&request).await,
            Err(GeoCamError::HttpError(_))
        ));
    }
}
