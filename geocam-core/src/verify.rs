//! Verification of an image against the payload it carries.
//!
//! The engine runs a small state machine:
//!
//! ```text
//! Idle -> Extracting -> Parsing -> VerifyingSignature -> Done
//!              \            \               \
//!               +------------+---------------+--> Done (with error kind)
//! ```
//!
//! Every outcome, including "nothing found" and "signature does not match",
//! is reported as a [`VerificationResult`] value. Nothing is retried.

use serde::{Deserialize, Serialize};

use crate::carrier::{
    CarrierKind, CarrierStrategy, CommentCarrier, ImageInput, SidecarCarrier,
    SteganographicCarrier,
};
use crate::error::{GeoCamError, Result};
use crate::metadata::CaptureMetadata;
use crate::payload::SignedPayload;
use crate::signer::{PublicKey, SignatureAlgorithm};
use crate::stego::StegoParams;

/// Message reported when no carrier holds a payload.
pub const NO_PAYLOAD_MESSAGE: &str = "No hidden information found in image";

/// Observable phase of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    Idle,
    Extracting,
    Parsing,
    VerifyingSignature,
    Done,
}

/// Why a verification did not reach a signature verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PayloadNotFound,
    MalformedPayload,
    InvalidSignatureEncoding,
}

/// Final outcome of [`VerificationEngine::verify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub carrier_used: CarrierKind,
    pub payload_found: bool,
    pub signature_valid: bool,
    /// Signed metadata, present only when the signature verified.
    pub decoded_metadata: Option<CaptureMetadata>,
    pub error_kind: Option<ErrorKind>,
    pub fingerprint: Option<String>,
    pub installation_id: Option<String>,
    pub algorithm: Option<SignatureAlgorithm>,
    pub message: String,
}

impl VerificationResult {
    fn not_found() -> Self {
        Self {
            carrier_used: CarrierKind::None,
            payload_found: false,
            signature_valid: false,
            decoded_metadata: None,
            error_kind: Some(ErrorKind::PayloadNotFound),
            fingerprint: None,
            installation_id: None,
            algorithm: None,
            message: NO_PAYLOAD_MESSAGE.to_string(),
        }
    }

    fn failed(carrier: CarrierKind, kind: ErrorKind, message: String) -> Self {
        Self {
            carrier_used: carrier,
            payload_found: true,
            signature_valid: false,
            decoded_metadata: None,
            error_kind: Some(kind),
            fingerprint: None,
            installation_id: None,
            algorithm: None,
            message,
        }
    }

    fn with_payload_identity(mut self, payload: &SignedPayload) -> Self {
        self.fingerprint = Some(payload.fingerprint().to_string());
        self.installation_id = Some(payload.installation_id().to_string());
        self.algorithm = Some(payload.algorithm());
        self
    }

    /// True only for a found payload whose signature verified.
    pub fn is_authentic(&self) -> bool {
        self.payload_found && self.signature_valid && self.error_kind.is_none()
    }
}

/// Internal state carrying the data produced so far.
enum Step {
    Idle,
    Extracting,
    Parsing {
        carrier: CarrierKind,
        raw: Vec<u8>,
    },
    VerifyingSignature {
        carrier: CarrierKind,
        payload: Box<SignedPayload>,
    },
    Done(VerificationResult),
}

impl Step {
    fn state(&self) -> VerificationState {
        match self {
            Step::Idle => VerificationState::Idle,
            Step::Extracting => VerificationState::Extracting,
            Step::Parsing { .. } => VerificationState::Parsing,
            Step::VerifyingSignature { .. } => VerificationState::VerifyingSignature,
            Step::Done(_) => VerificationState::Done,
        }
    }
}

/// Walks the carrier chain and checks the payload it finds.
///
/// Holds no mutable state, so one engine can serve any number of concurrent
/// verifications.
pub struct VerificationEngine {
    carriers: Vec<Box<dyn CarrierStrategy>>,
    trusted_key: Option<PublicKey>,
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationEngine {
    /// Engine with the default chain: comment field, sidecar, steganographic.
    pub fn new() -> Self {
        Self::with_carriers(vec![
            Box::new(CommentCarrier),
            Box::new(SidecarCarrier),
            Box::new(SteganographicCarrier::default()),
        ])
    }

    /// Engine with the default chain and custom codec parameters.
    pub fn with_params(params: StegoParams) -> Result<Self> {
        Ok(Self::with_carriers(crate::carrier::default_chain(params)?))
    }

    pub fn with_carriers(carriers: Vec<Box<dyn CarrierStrategy>>) -> Self {
        Self {
            carriers,
            trusted_key: None,
        }
    }

    /// Verify against `key` instead of the key embedded in the payload.
    pub fn with_trusted_key(mut self, key: PublicKey) -> Self {
        self.trusted_key = Some(key);
        self
    }

    pub fn trusted_key(&self) -> Option<&PublicKey> {
        self.trusted_key.as_ref()
    }

    pub fn carriers(&self) -> impl Iterator<Item = CarrierKind> + '_ {
        self.carriers.iter().map(|c| c.kind())
    }

    /// Verify image bytes that have no path or sidecar context.
    pub fn verify_bytes(&self, bytes: &[u8]) -> VerificationResult {
        self.verify(&ImageInput::from_bytes(bytes))
    }

    pub fn verify(&self, image: &ImageInput) -> VerificationResult {
        let mut step = Step::Idle;
        loop {
            tracing::debug!(state = ?step.state(), "Verification state");
            step = match step {
                Step::Idle => Step::Extracting,
                Step::Extracting => match self.extract(image) {
                    Some((carrier, raw)) => Step::Parsing { carrier, raw },
                    None => Step::Done(VerificationResult::not_found()),
                },
                Step::Parsing { carrier, raw } => match SignedPayload::from_json(&raw) {
                    Ok(payload) => Step::VerifyingSignature {
                        carrier,
                        payload: Box::new(payload),
                    },
                    Err(e) => Step::Done(VerificationResult::failed(
                        carrier,
                        ErrorKind::MalformedPayload,
                        e.to_string(),
                    )),
                },
                Step::VerifyingSignature { carrier, payload } => {
                    Step::Done(self.check_signature(carrier, &payload))
                }
                Step::Done(result) => {
                    tracing::info!(
                        carrier = %result.carrier_used,
                        payload_found = result.payload_found,
                        signature_valid = result.signature_valid,
                        error_kind = ?result.error_kind,
                        "Verification finished"
                    );
                    return result;
                }
            };
        }
    }

    fn extract(&self, image: &ImageInput) -> Option<(CarrierKind, Vec<u8>)> {
        for carrier in &self.carriers {
            let kind = carrier.kind();
            match carrier.try_extract(image) {
                Ok(Some(raw)) => {
                    tracing::debug!(carrier = %kind, bytes = raw.len(), "Payload extracted");
                    return Some((kind, raw));
                }
                Ok(None) => tracing::debug!(carrier = %kind, "Carrier holds no payload"),
                Err(e) => tracing::warn!(carrier = %kind, error = %e, "Carrier failed"),
            }
        }
        None
    }

    fn check_signature(&self, carrier: CarrierKind, payload: &SignedPayload) -> VerificationResult {
        let outcome = payload
            .verify_with(self.trusted_key.as_ref())
            .and_then(|valid| Ok((valid, payload.metadata()?)));

        let result = match outcome {
            Ok((true, metadata)) => VerificationResult {
                carrier_used: carrier,
                payload_found: true,
                signature_valid: true,
                decoded_metadata: Some(metadata),
                error_kind: None,
                fingerprint: None,
                installation_id: None,
                algorithm: None,
                message: "Signature verified".to_string(),
            },
            Ok((false, _)) => VerificationResult {
                carrier_used: carrier,
                payload_found: true,
                signature_valid: false,
                decoded_metadata: None,
                error_kind: None,
                fingerprint: None,
                installation_id: None,
                algorithm: None,
                message: "Signature does not match: image altered or signed by another key"
                    .to_string(),
            },
            Err(GeoCamError::InvalidSignatureEncoding(msg)) => VerificationResult::failed(
                carrier,
                ErrorKind::InvalidSignatureEncoding,
                format!("Invalid signature encoding: {msg}"),
            ),
            Err(e) => {
                VerificationResult::failed(carrier, ErrorKind::MalformedPayload, e.to_string())
            }
        };
        result.with_payload_identity(payload)
    }
}
