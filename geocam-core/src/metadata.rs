//! Capture metadata and its canonical byte form.
//!
//! The canonical form is the exact input to signing and verification. It is
//! compact JSON with object keys sorted at every level, using the same field
//! names as the embedded payload (`deviceModel`, `Time`, `location`, plus any
//! extension fields). Signer and verifier must agree on it byte for byte, so
//! it never depends on insertion order or on the JSON map implementation.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GeoCamError, Result};

/// Wire keys that belong to the payload envelope and cannot be used as
/// extension field names.
pub const RESERVED_KEYS: &[&str] = &[
    "deviceModel",
    "Time",
    "location",
    "signature",
    "publicKey",
    "algorithm",
    "fingerprint",
    "installationId",
];

/// Geographic position at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(GeoCamError::MalformedMetadata(
                "location coordinates must be finite".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoCamError::MalformedMetadata(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoCamError::MalformedMetadata(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Privacy-preserving geohash of this position, for display only.
    pub fn geohash(&self, precision: usize) -> Result<String> {
        geohash::encode(
            geohash::Coord {
                x: self.longitude,
                y: self.latitude,
            },
            precision,
        )
        .map_err(|e| GeoCamError::MalformedMetadata(format!("geohash: {e}")))
    }
}

/// Value of an extension field: a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Text(String),
    Number(f64),
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for ExtensionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ExtensionValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl std::fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Metadata recorded at capture time. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    #[serde(rename = "deviceModel")]
    device_model: String,
    #[serde(rename = "Time")]
    captured_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(flatten)]
    extensions: BTreeMap<String, ExtensionValue>,
}

impl CaptureMetadata {
    /// Start building metadata for a capture.
    pub fn builder(
        device_model: impl Into<String>,
        captured_at: impl Into<String>,
    ) -> CaptureMetadataBuilder {
        CaptureMetadataBuilder {
            device_model: device_model.into(),
            captured_at: captured_at.into(),
            location: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Start building metadata stamped with the current UTC time.
    pub fn captured_now(device_model: impl Into<String>) -> CaptureMetadataBuilder {
        Self::builder(
            device_model,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    pub fn device_model(&self) -> &str {
        &self.device_model
    }

    pub fn captured_at(&self) -> &str {
        &self.captured_at
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn extensions(&self) -> &BTreeMap<String, ExtensionValue> {
        &self.extensions
    }

    /// Canonical bytes of this metadata. See [`canonicalize`].
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonicalize(self)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.device_model.trim().is_empty() {
            return Err(GeoCamError::MalformedMetadata(
                "deviceModel is required".into(),
            ));
        }
        if self.captured_at.trim().is_empty() {
            return Err(GeoCamError::MalformedMetadata("Time is required".into()));
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        for (key, value) in &self.extensions {
            if key.is_empty() {
                return Err(GeoCamError::MalformedMetadata(
                    "extension key must not be empty".into(),
                ));
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(GeoCamError::MalformedMetadata(format!(
                    "extension key '{key}' is reserved"
                )));
            }
            if let ExtensionValue::Number(n) = value {
                if !n.is_finite() {
                    return Err(GeoCamError::MalformedMetadata(format!(
                        "extension '{key}' is not a finite number"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`CaptureMetadata`].
#[derive(Debug, Clone)]
pub struct CaptureMetadataBuilder {
    device_model: String,
    captured_at: String,
    location: Option<Location>,
    extensions: BTreeMap<String, ExtensionValue>,
}

impl CaptureMetadataBuilder {
    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(Location::new(latitude, longitude));
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: impl Into<ExtensionValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<CaptureMetadata> {
        let metadata = CaptureMetadata {
            device_model: self.device_model,
            captured_at: self.captured_at,
            location: self.location,
            extensions: self.extensions,
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum CanonicalValue<'a> {
    Text(&'a str),
    Number(f64),
    Object(BTreeMap<&'a str, CanonicalValue<'a>>),
}

/// Deterministic serialization of `metadata`.
///
/// Fails with [`GeoCamError::MalformedMetadata`] when `deviceModel` or `Time`
/// is absent or any field cannot be represented canonically.
pub fn canonicalize(metadata: &CaptureMetadata) -> Result<Vec<u8>> {
    let root = canonical_map(metadata)?;
    serde_json::to_vec(&root).map_err(|e| GeoCamError::SerializationError(e.to_string()))
}

/// Exact signing input: the canonical metadata object with the installation
/// id added under `installationId` when non-empty.
///
/// Signature, public key and fingerprint never take part.
pub fn signing_bytes(metadata: &CaptureMetadata, installation_id: &str) -> Result<Vec<u8>> {
    let mut root = canonical_map(metadata)?;
    if !installation_id.is_empty() {
        root.insert("installationId", CanonicalValue::Text(installation_id));
    }
    serde_json::to_vec(&root).map_err(|e| GeoCamError::SerializationError(e.to_string()))
}

fn canonical_map(metadata: &CaptureMetadata) -> Result<BTreeMap<&str, CanonicalValue<'_>>> {
    metadata.validate()?;

    let mut root: BTreeMap<&str, CanonicalValue<'_>> = BTreeMap::new();
    root.insert("deviceModel", CanonicalValue::Text(&metadata.device_model));
    root.insert("Time", CanonicalValue::Text(&metadata.captured_at));

    if let Some(location) = &metadata.location {
        let mut coords = BTreeMap::new();
        coords.insert("latitude", CanonicalValue::Number(location.latitude));
        coords.insert("longitude", CanonicalValue::Number(location.longitude));
        root.insert("location", CanonicalValue::Object(coords));
    }

    for (key, value) in &metadata.extensions {
        let value = match value {
            ExtensionValue::Text(s) => CanonicalValue::Text(s),
            ExtensionValue::Number(n) => CanonicalValue::Number(*n),
        };
        root.insert(key, value);
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form_is_sorted_compact_json() {
        let metadata = CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .build()
            .unwrap();

        let bytes = canonicalize(&metadata).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"Time":"2024-01-01T00:00:00Z","deviceModel":"TestCam"}"#
        );
    }

    #[test]
    fn test_canonical_form_with_location() {
        let metadata = CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .location(48.8584, 2.2945)
            .build()
            .unwrap();

        let text = String::from_utf8(canonicalize(&metadata).unwrap()).unwrap();
        assert_eq!(
            text,
            r#"{"Time":"2024-01-01T00:00:00Z","deviceModel":"TestCam","location":{"latitude":48.8584,"longitude":2.2945}}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_change_canonical_bytes() {
        let a = CaptureMetadata::builder("Pixel 8", "2024-05-05T10:00:00Z")
            .extension("osName", "Android")
            .extension("altitude", 35.5)
            .extension("appVersion", "1.2.0")
            .build()
            .unwrap();
        let b = CaptureMetadata::builder("Pixel 8", "2024-05-05T10:00:00Z")
            .extension("appVersion", "1.2.0")
            .extension("altitude", 35.5)
            .extension("osName", "Android")
            .build()
            .unwrap();

        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let err = CaptureMetadata::builder("", "2024-01-01T00:00:00Z")
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoCamError::MalformedMetadata(_)));

        let err = CaptureMetadata::builder("TestCam", "  ").build().unwrap_err();
        assert!(matches!(err, GeoCamError::MalformedMetadata(_)));
    }

    #[test]
    fn test_reserved_extension_key_rejected() {
        let err = CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .extension("signature", "forged")
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoCamError::MalformedMetadata(_)));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let err = CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .extension("exposure", f64::NAN)
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoCamError::MalformedMetadata(_)));

        let err = CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .location(91.0, 0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoCamError::MalformedMetadata(_)));
    }

    #[test]
    fn test_captured_now_uses_rfc3339_utc() {
        let metadata = CaptureMetadata::captured_now("TestCam").build().unwrap();
        assert!(metadata.captured_at().ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(metadata.captured_at()).is_ok());
    }

    #[test]
    fn test_signing_bytes_bind_installation_id() {
        let metadata = CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .build()
            .unwrap();

        assert_eq!(
            signing_bytes(&metadata, "").unwrap(),
            canonicalize(&metadata).unwrap()
        );
        assert_eq!(
            String::from_utf8(signing_bytes(&metadata, "abc").unwrap()).unwrap(),
            r#"{"Time":"2024-01-01T00:00:00Z","deviceModel":"TestCam","installationId":"abc"}"#
        );
    }

    #[test]
    fn test_geohash_display() {
        let location = Location::new(57.64911, 10.40744);
        assert_eq!(location.geohash(11).unwrap(), "u4pruydqqvj");
    }
}
