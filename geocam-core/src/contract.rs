//! Request/response contract of the image verification service.
//!
//! ```json
//! // POST /api/verify-image
//! { "imageBase64": "<base64 or data URL>" }
//!
//! // response
//! {
//!   "success": true,
//!   "verification_result": {
//!     "signature_valid": true,
//!     "decoded_info": { "deviceModel": "...", "Time": "...", "location": { ... } },
//!     "message": "Signature verified"
//!   }
//! }
//! ```
//!
//! `success` is false when no payload was found in the image. `decoded_info`
//! is kept as a loose JSON object: other implementations of the service send
//! `null` for missing fields and arbitrary extension values.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha3::{Digest, Sha3_256};

use crate::error::{GeoCamError, Result};
use crate::metadata::CaptureMetadata;
use crate::verify::VerificationResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyImageRequest {
    #[serde(rename = "imageBase64")]
    pub image_base64: String,
}

impl VerifyImageRequest {
    pub fn from_image_bytes(bytes: &[u8]) -> Self {
        Self {
            image_base64: BASE64.encode(bytes),
        }
    }

    pub fn decode_image(&self) -> Result<Vec<u8>> {
        decode_base64_image(&self.image_base64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyImageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_result: Option<RemoteVerificationResult>,
    /// SHA3-256 of the submitted image bytes, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Decoded metadata fields as they appear on the wire.
pub type DecodedInfo = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVerificationResult {
    pub signature_valid: bool,
    /// Signed, non-signature fields; only present for a valid signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded_info: Option<DecodedInfo>,
    pub message: String,
}

impl RemoteVerificationResult {
    /// Typed view of `decoded_info`, when it is complete enough to be one.
    pub fn capture_metadata(&self) -> Option<CaptureMetadata> {
        let info = self.decoded_info.as_ref()?;
        serde_json::from_value(Value::Object(info.clone())).ok()
    }
}

impl VerifyImageResponse {
    /// Build the wire response for a local verification of `image`.
    pub fn from_result(result: &VerificationResult, image: &[u8]) -> Self {
        Self {
            image_hash: Some(hex::encode(Sha3_256::digest(image))),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..Self::from(result)
        }
    }
}

impl From<&VerificationResult> for VerifyImageResponse {
    fn from(result: &VerificationResult) -> Self {
        Self {
            success: result.payload_found,
            verification_result: Some(RemoteVerificationResult {
                signature_valid: result.is_authentic(),
                decoded_info: result
                    .decoded_metadata
                    .as_ref()
                    .filter(|_| result.is_authentic())
                    .and_then(metadata_object),
                message: result.message.clone(),
            }),
            image_hash: None,
            timestamp: None,
        }
    }
}

fn metadata_object(metadata: &CaptureMetadata) -> Option<DecodedInfo> {
    match serde_json::to_value(metadata) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Decode base64 image data, accepting a `data:image/...;base64,` prefix.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>> {
    let trimmed = encoded.trim();
    let data = match trimmed.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    let bytes = BASE64
        .decode(data)
        .map_err(|e| GeoCamError::ImageLoadFailure(format!("invalid base64 image: {e}")))?;
    if bytes.is_empty() {
        return Err(GeoCamError::ImageLoadFailure("empty image".into()));
    }
    Ok(bytes)
}
