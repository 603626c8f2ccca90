//! One-shot hand-off of an encode job to an isolated worker.
//!
//! The caller submits the source image and payload, then waits for exactly one
//! outcome: the encoded image or an error. The wait is always bounded by
//! [`HostConfig::timeout`]; a worker that does not answer in time is abandoned
//! and reported as [`GeoCamError::HostTimeout`].

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::contract::decode_base64_image;
use crate::error::{GeoCamError, Result};
use crate::stego::{StegoCodec, StegoParams};

/// Default time to wait for the worker.
pub const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        let timeout = std::env::var("GEOCAM_HOST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_HOST_TIMEOUT);
        Self { timeout }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeRequest {
    /// Source image, base64 or data URL.
    pub image_base64: String,
    pub payload_json: String,
    #[serde(default)]
    pub params: StegoParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeResponse {
    /// Encoded PNG, base64.
    pub image_base64: String,
}

/// Runs encode jobs on the blocking thread pool.
#[derive(Debug, Clone, Default)]
pub struct EncodeHost {
    config: HostConfig,
}

impl EncodeHost {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(HostConfig { timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    #[instrument(level = "debug", skip_all, fields(payload_len = request.payload_json.len()))]
    pub async fn submit(&self, request: EncodeRequest) -> Result<EncodeResponse> {
        let timeout = self.config.timeout;
        let job = tokio::task::spawn_blocking(move || run_encode(request));

        match tokio::time::timeout(timeout, job).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => {
                warn!(error = %join_error, "Encode worker crashed");
                Err(GeoCamError::HostFailure(join_error.to_string()))
            }
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "Encode worker did not respond");
                Err(GeoCamError::HostTimeout { timeout_ms })
            }
        }
    }
}

fn run_encode(request: EncodeRequest) -> Result<EncodeResponse> {
    let image = decode_base64_image(&request.image_base64)?;
    let codec = StegoCodec::new(request.params)?;
    let encoded = codec.encode_image(&image, &request.payload_json)?;
    debug!(
        input_bytes = image.len(),
        output_bytes = encoded.len(),
        "Encode job finished"
    );
    Ok(EncodeResponse {
        image_base64: BASE64.encode(encoded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32) -> String {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 77, 255])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        BASE64.encode(out)
    }

    #[tokio::test]
    async fn test_submit_encodes_image() {
        let host = EncodeHost::with_timeout(Duration::from_secs(30));
        let response = host
            .submit(EncodeRequest {
                image_base64: png_base64(40, 40),
                payload_json: r#"{"deviceModel":"TestCam"}"#.into(),
                params: StegoParams::default(),
            })
            .await
            .unwrap();

        let bytes = BASE64.decode(response.image_base64).unwrap();
        let text = StegoCodec::default().decode_image(&bytes).unwrap();
        assert_eq!(text, r#"{"deviceModel":"TestCam"}"#);
    }

    #[tokio::test]
    async fn test_bad_image_is_load_failure() {
        let host = EncodeHost::default();
        let result = host
            .submit(EncodeRequest {
                image_base64: BASE64.encode(b"definitely not a png"),
                payload_json: "{}".into(),
                params: StegoParams::default(),
            })
            .await;
        assert!(matches!(result, Err(GeoCamError::ImageLoadFailure(_))));

        let result = host
            .submit(EncodeRequest {
                image_base64: "***".into(),
                payload_json: "{}".into(),
                params: StegoParams::default(),
            })
            .await;
        assert!(matches!(result, Err(GeoCamError::ImageLoadFailure(_))));
    }

    #[tokio::test]
    async fn test_capacity_error_is_returned() {
        let host = EncodeHost::default();
        let result = host
            .submit(EncodeRequest {
                image_base64: png_base64(8, 8),
                payload_json: "x".repeat(100),
                params: StegoParams::default(),
            })
            .await;
        assert!(matches!(result, Err(GeoCamError::CapacityExceeded { .. })));
    }

    #[tokio::test]
    async fn test_unresponsive_worker_times_out() {
        let host = EncodeHost::with_timeout(Duration::ZERO);
        let result = host
            .submit(EncodeRequest {
                image_base64: png_base64(1024, 1024),
                payload_json: "{}".into(),
                params: StegoParams::default(),
            })
            .await;
        assert!(matches!(
            result,
            Err(GeoCamError::HostTimeout { timeout_ms: 0 })
        ));
    }

    #[test]
    fn test_request_wire_names() {
        let request = EncodeRequest {
            image_base64: "AA==".into(),
            payload_json: "{}".into(),
            params: StegoParams::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["imageBase64"], "AA==");
        assert_eq!(json["payloadJson"], "{}");
        assert_eq!(json["params"]["codeUnitSize"], 16);
    }
}
