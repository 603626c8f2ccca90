//! The signed payload embedded in (or alongside) an image.
//!
//! Wire format (compact JSON):
//!
//! ```json
//! {
//!   "deviceModel": "TestCam",
//!   "Time": "2024-01-01T00:00:00Z",
//!   "location": { "latitude": 48.85, "longitude": 2.29 },
//!   "signature": { "value": "<base64>", "algorithm": "Ed25519" },
//!   "publicKey": "<base64>",
//!   "algorithm": "Ed25519",
//!   "fingerprint": "<hex sha3-256 of publicKey>",
//!   "installationId": "<uuid>"
//! }
//! ```
//!
//! Extension fields of the metadata sit at the top level next to these keys.
//! The signature covers the canonical metadata together with the installation
//! id (see [`crate::metadata::signing_bytes`]).

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{GeoCamError, Result, MAX_PAYLOAD_SIZE};
use crate::metadata::{self, CaptureMetadata, ExtensionValue, Location};
use crate::signer::{self, KeyPair, PublicKey, SignatureAlgorithm};

/// `signature` object of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// Base64 signature bytes.
    pub value: String,
    pub algorithm: SignatureAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedPayload {
    #[serde(rename = "deviceModel")]
    device_model: String,
    #[serde(rename = "Time")]
    captured_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    signature: SignatureEnvelope,
    #[serde(rename = "publicKey")]
    public_key: String,
    algorithm: SignatureAlgorithm,
    #[serde(default)]
    fingerprint: String,
    #[serde(rename = "installationId", default)]
    installation_id: String,
    #[serde(flatten)]
    extensions: BTreeMap<String, ExtensionValue>,
}

impl SignedPayload {
    /// Sign `metadata` with the device key pair.
    pub fn sign(metadata: &CaptureMetadata, keypair: &KeyPair) -> Result<Self> {
        let canonical = metadata::signing_bytes(metadata, keypair.installation_id())?;
        let signature = keypair.sign(&canonical)?;
        let algorithm = keypair.algorithm();

        tracing::debug!(
            algorithm = %algorithm,
            canonical_len = canonical.len(),
            "Signed capture metadata"
        );

        Ok(Self {
            device_model: metadata.device_model().to_string(),
            captured_at: metadata.captured_at().to_string(),
            location: metadata.location(),
            signature: SignatureEnvelope {
                value: BASE64.encode(signature),
                algorithm,
            },
            public_key: keypair.public_key().to_base64(),
            algorithm,
            fingerprint: keypair.fingerprint(),
            installation_id: keypair.installation_id().to_string(),
            extensions: metadata.extensions().clone(),
        })
    }

    /// Parse and structurally validate a payload extracted from a carrier.
    ///
    /// Anything that is not a complete, self-consistent payload is
    /// [`GeoCamError::MalformedPayload`].
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(GeoCamError::MalformedPayload(format!(
                "payload is {} bytes, limit is {MAX_PAYLOAD_SIZE}",
                bytes.len()
            )));
        }

        let payload: Self = serde_json::from_slice(bytes)
            .map_err(|e| GeoCamError::MalformedPayload(e.to_string()))?;

        if payload.signature.algorithm != payload.algorithm {
            return Err(GeoCamError::MalformedPayload(format!(
                "signature algorithm {} does not match payload algorithm {}",
                payload.signature.algorithm, payload.algorithm
            )));
        }

        let public_key = payload
            .embedded_public_key()
            .map_err(|e| GeoCamError::MalformedPayload(e.to_string()))?;

        if !payload.fingerprint.is_empty() && payload.fingerprint != public_key.fingerprint() {
            tracing::warn!(
                claimed = %payload.fingerprint,
                "Payload fingerprint does not match its public key"
            );
            return Err(GeoCamError::MalformedPayload(
                "fingerprint does not match publicKey".into(),
            ));
        }

        payload
            .metadata()
            .map_err(|e| GeoCamError::MalformedPayload(e.to_string()))?;

        Ok(payload)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| GeoCamError::SerializationError(e.to_string()))
    }

    /// The signed capture metadata, without any signature fields.
    pub fn metadata(&self) -> Result<CaptureMetadata> {
        let mut builder = CaptureMetadata::builder(&self.device_model, &self.captured_at);
        if let Some(location) = self.location {
            builder = builder.location(location.latitude, location.longitude);
        }
        for (key, value) in &self.extensions {
            builder = builder.extension(key, value.clone());
        }
        builder.build()
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn installation_id(&self) -> &str {
        &self.installation_id
    }

    /// Public key carried in the payload.
    pub fn embedded_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_base64(self.algorithm, &self.public_key)
    }

    /// Raw signature bytes.
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.signature.value.trim())
            .map_err(|e| GeoCamError::InvalidSignatureEncoding(format!("invalid base64: {e}")))
    }

    /// Re-canonicalize the metadata and check the signature.
    ///
    /// Uses `trusted` when given, otherwise the key embedded in the payload.
    /// A trusted key of a different algorithm can never match and yields
    /// `Ok(false)`.
    pub fn verify_with(&self, trusted: Option<&PublicKey>) -> Result<bool> {
        let signature = self.signature_bytes()?;
        let canonical = metadata::signing_bytes(&self.metadata()?, &self.installation_id)?;

        match trusted {
            Some(key) if key.algorithm() != self.algorithm => {
                tracing::warn!(
                    trusted = %key.algorithm(),
                    payload = %self.algorithm,
                    "Trusted key algorithm differs from payload algorithm"
                );
                Ok(false)
            }
            Some(key) => signer::verify(key, &canonical, &signature),
            None => signer::verify(&self.embedded_public_key()?, &canonical, &signature),
        }
    }
}
