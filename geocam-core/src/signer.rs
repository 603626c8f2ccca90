//! Asymmetric signing and verification of canonical metadata bytes.
//!
//! The scheme is selected by [`SignatureAlgorithm`] rather than hard-coded, so
//! the image-payload key and a device-identity key can share one interface.
//!
//! - `Ed25519`: 32-byte keys, 64-byte signatures (default for image payloads)
//! - `ML-DSA-65`: FIPS 204 post-quantum signatures, fixed size

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer as _, Verifier as _};
use pqcrypto_mldsa::mldsa65;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroizing;

use crate::error::{GeoCamError, Result};

/// Ed25519 public key size in bytes.
pub const ED25519_PUBLIC_KEY_BYTES: usize = 32;
/// Ed25519 secret key (seed) size in bytes.
pub const ED25519_SECRET_KEY_BYTES: usize = 32;
/// Ed25519 signature size in bytes.
pub const ED25519_SIGNATURE_BYTES: usize = 64;

/// Signature scheme identifier carried in every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[default]
    #[serde(rename = "Ed25519")]
    Ed25519,
    #[serde(rename = "ML-DSA-65")]
    MlDsa65,
}

impl SignatureAlgorithm {
    /// Wire identifier, e.g. `"Ed25519"`.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::MlDsa65 => "ML-DSA-65",
        }
    }

    pub fn public_key_len(&self) -> usize {
        match self {
            Self::Ed25519 => ED25519_PUBLIC_KEY_BYTES,
            Self::MlDsa65 => mldsa65::public_key_bytes(),
        }
    }

    pub fn secret_key_len(&self) -> usize {
        match self {
            Self::Ed25519 => ED25519_SECRET_KEY_BYTES,
            Self::MlDsa65 => mldsa65::secret_key_bytes(),
        }
    }

    pub fn signature_len(&self) -> usize {
        match self {
            Self::Ed25519 => ED25519_SIGNATURE_BYTES,
            Self::MlDsa65 => mldsa65::signature_bytes(),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = GeoCamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            "ml-dsa-65" | "mldsa65" | "ml_dsa_65" => Ok(Self::MlDsa65),
            _ => Err(GeoCamError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Secret key bytes that are wiped from memory on drop.
#[derive(Clone)]
pub struct ZeroizingSecretKey {
    algorithm: SignatureAlgorithm,
    bytes: Zeroizing<Vec<u8>>,
}

impl ZeroizingSecretKey {
    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: Vec<u8>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() != algorithm.secret_key_len() {
            return Err(GeoCamError::KeyStore(format!(
                "{algorithm} secret key must be {} bytes, got {}",
                algorithm.secret_key_len(),
                bytes.len()
            )));
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ZeroizingSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZeroizingSecretKey")
            .field("algorithm", &self.algorithm)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Raw public key tagged with its algorithm.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: SignatureAlgorithm,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Wrap raw public key bytes, checking they parse for `algorithm`.
    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != algorithm.public_key_len() {
            return Err(GeoCamError::InvalidPublicKey(format!(
                "{algorithm} public key must be {} bytes, got {}",
                algorithm.public_key_len(),
                bytes.len()
            )));
        }
        match algorithm {
            SignatureAlgorithm::Ed25519 => {
                ed25519_verifying_key(&bytes)?;
            }
            SignatureAlgorithm::MlDsa65 => {
                mldsa65::PublicKey::from_bytes(&bytes)
                    .map_err(|e| GeoCamError::InvalidPublicKey(e.to_string()))?;
            }
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn from_base64(algorithm: SignatureAlgorithm, encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| GeoCamError::InvalidPublicKey(format!("invalid base64: {e}")))?;
        Self::from_bytes(algorithm, bytes)
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// SHA3-256 fingerprint (lowercase hex) of the raw key bytes.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Stable display/correlation identifier for a public key.
///
/// Carries no authentication weight by itself.
pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode(Sha3_256::digest(public_key))
}

fn ed25519_verifying_key(bytes: &[u8]) -> Result<ed25519_dalek::VerifyingKey> {
    let raw: [u8; ED25519_PUBLIC_KEY_BYTES] = bytes.try_into().map_err(|_| {
        GeoCamError::InvalidPublicKey(format!("expected {ED25519_PUBLIC_KEY_BYTES} bytes"))
    })?;
    ed25519_dalek::VerifyingKey::from_bytes(&raw)
        .map_err(|e| GeoCamError::InvalidPublicKey(e.to_string()))
}

/// Sign `message` with `secret`. Pure function of its inputs for Ed25519.
pub fn sign(secret: &ZeroizingSecretKey, message: &[u8]) -> Result<Vec<u8>> {
    match secret.algorithm {
        SignatureAlgorithm::Ed25519 => {
            let seed: Zeroizing<[u8; ED25519_SECRET_KEY_BYTES]> =
                Zeroizing::new(secret.expose().try_into().map_err(|_| {
                    GeoCamError::KeyStore("Ed25519 secret key has wrong length".into())
                })?);
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
            Ok(signing_key.sign(message).to_bytes().to_vec())
        }
        SignatureAlgorithm::MlDsa65 => {
            let secret_key = mldsa65::SecretKey::from_bytes(secret.expose())
                .map_err(|e| GeoCamError::KeyStore(format!("ML-DSA-65 secret key: {e}")))?;
            Ok(mldsa65::detached_sign(message, &secret_key)
                .as_bytes()
                .to_vec())
        }
    }
}

/// Verify `signature` over `message`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match, and
/// [`GeoCamError::InvalidSignatureEncoding`] when the signature cannot be a
/// signature of this scheme at all, so callers can tell "tampered" from
/// "malformed".
pub fn verify(public: &PublicKey, message: &[u8], signature: &[u8]) -> Result<bool> {
    let algorithm = public.algorithm;
    if signature.len() != algorithm.signature_len() {
        return Err(GeoCamError::InvalidSignatureEncoding(format!(
            "{algorithm} signature must be {} bytes, got {}",
            algorithm.signature_len(),
            signature.len()
        )));
    }

    match algorithm {
        SignatureAlgorithm::Ed25519 => {
            let verifying_key = ed25519_verifying_key(&public.bytes)?;
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|e| GeoCamError::InvalidSignatureEncoding(e.to_string()))?;
            Ok(verifying_key.verify(message, &signature).is_ok())
        }
        SignatureAlgorithm::MlDsa65 => {
            let public_key = mldsa65::PublicKey::from_bytes(&public.bytes)
                .map_err(|e| GeoCamError::InvalidPublicKey(e.to_string()))?;
            let signature = mldsa65::DetachedSignature::from_bytes(signature)
                .map_err(|e| GeoCamError::InvalidSignatureEncoding(e.to_string()))?;
            Ok(mldsa65::verify_detached_signature(&signature, message, &public_key).is_ok())
        }
    }
}

/// Device key pair, created once per installation.
#[derive(Clone)]
pub struct KeyPair {
    secret: ZeroizingSecretKey,
    public: PublicKey,
    installation_id: String,
}

impl KeyPair {
    /// Generate a fresh key pair with a new installation id.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self> {
        let installation_id = uuid::Uuid::new_v4().to_string();
        match algorithm {
            SignatureAlgorithm::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; ED25519_SECRET_KEY_BYTES]);
                getrandom::fill(seed.as_mut_slice())
                    .map_err(|e| GeoCamError::KeyGeneration(e.to_string()))?;
                Ok(Self::from_ed25519_seed(&seed, installation_id))
            }
            SignatureAlgorithm::MlDsa65 => {
                let (public_key, secret_key) = mldsa65::keypair();
                Ok(Self {
                    secret: ZeroizingSecretKey {
                        algorithm,
                        bytes: Zeroizing::new(secret_key.as_bytes().to_vec()),
                    },
                    public: PublicKey {
                        algorithm,
                        bytes: public_key.as_bytes().to_vec(),
                    },
                    installation_id,
                })
            }
        }
    }

    /// Deterministic Ed25519 key pair from a 32-byte seed.
    pub fn from_ed25519_seed(
        seed: &[u8; ED25519_SECRET_KEY_BYTES],
        installation_id: impl Into<String>,
    ) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self {
            secret: ZeroizingSecretKey {
                algorithm: SignatureAlgorithm::Ed25519,
                bytes: Zeroizing::new(seed.to_vec()),
            },
            public: PublicKey {
                algorithm: SignatureAlgorithm::Ed25519,
                bytes: signing_key.verifying_key().to_bytes().to_vec(),
            },
            installation_id: installation_id.into(),
        }
    }

    /// Reassemble a key pair from stored parts.
    pub fn from_parts(
        secret: ZeroizingSecretKey,
        public: PublicKey,
        installation_id: impl Into<String>,
    ) -> Result<Self> {
        if secret.algorithm != public.algorithm {
            return Err(GeoCamError::KeyStore(format!(
                "secret key is {} but public key is {}",
                secret.algorithm, public.algorithm
            )));
        }
        if secret.algorithm == SignatureAlgorithm::Ed25519 {
            let seed: [u8; ED25519_SECRET_KEY_BYTES] = secret
                .expose()
                .try_into()
                .map_err(|_| GeoCamError::KeyStore("Ed25519 secret key has wrong length".into()))?;
            let derived = ed25519_dalek::SigningKey::from_bytes(&seed)
                .verifying_key()
                .to_bytes();
            if derived.as_slice() != public.as_bytes() {
                return Err(GeoCamError::KeyStore(
                    "public key does not belong to secret key".into(),
                ));
            }
        }
        Ok(Self {
            secret,
            public,
            installation_id: installation_id.into(),
        })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.public.algorithm
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret_key(&self) -> &ZeroizingSecretKey {
        &self.secret
    }

    pub fn installation_id(&self) -> &str {
        &self.installation_id
    }

    pub fn fingerprint(&self) -> String {
        self.public.fingerprint()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        sign(&self.secret, message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &self.secret)
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keypair(seed: u8) -> KeyPair {
        KeyPair::from_ed25519_seed(&[seed; 32], "test-installation")
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let keypair = test_keypair(7);
        let message = br#"{"Time":"2024-01-01T00:00:00Z","deviceModel":"TestCam"}"#;

        let signature = keypair.sign(message).unwrap();
        assert_eq!(signature.len(), ED25519_SIGNATURE_BYTES);
        assert!(verify(keypair.public_key(), message, &signature).unwrap());

        // Signing is deterministic for Ed25519
        assert_eq!(signature, keypair.sign(message).unwrap());
    }

    #[test]
    fn test_wrong_key_and_tampered_message_fail() {
        let keypair = test_keypair(7);
        let other = test_keypair(8);
        let message = b"capture";
        let signature = keypair.sign(message).unwrap();

        assert!(!verify(other.public_key(), message, &signature).unwrap());
        assert!(!verify(keypair.public_key(), b"capturE", &signature).unwrap());
    }

    #[test]
    fn test_wrong_signature_length_is_encoding_error() {
        let keypair = test_keypair(7);
        let result = verify(keypair.public_key(), b"capture", &[0u8; 63]);
        assert!(matches!(
            result,
            Err(GeoCamError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn test_mldsa65_sign_verify() {
        let keypair = KeyPair::generate(SignatureAlgorithm::MlDsa65).unwrap();
        let message = b"post-quantum capture";

        let signature = keypair.sign(message).unwrap();
        assert_eq!(signature.len(), SignatureAlgorithm::MlDsa65.signature_len());
        assert!(verify(keypair.public_key(), message, &signature).unwrap());
        assert!(!verify(keypair.public_key(), b"other", &signature).unwrap());

        let result = verify(keypair.public_key(), message, &signature[..64]);
        assert!(matches!(
            result,
            Err(GeoCamError::InvalidSignatureEncoding(_))
        ));
    }

    #[test]
    fn test_generated_ed25519_keys_differ() {
        let a = KeyPair::generate(SignatureAlgorithm::Ed25519).unwrap();
        let b = KeyPair::generate(SignatureAlgorithm::Ed25519).unwrap();
        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.installation_id(), b.installation_id());
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let keypair = test_keypair(1);
        let fp = keypair.fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, test_keypair(1).fingerprint());
        assert_ne!(fp, test_keypair(2).fingerprint());
    }

    #[test]
    fn test_public_key_base64_roundtrip() {
        let keypair = test_keypair(3);
        let encoded = keypair.public_key().to_base64();
        let decoded = PublicKey::from_base64(SignatureAlgorithm::Ed25519, &encoded).unwrap();
        assert_eq!(&decoded, keypair.public_key());

        assert!(matches!(
            PublicKey::from_base64(SignatureAlgorithm::Ed25519, "AAAA"),
            Err(GeoCamError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!(
            "Ed25519".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::Ed25519
        );
        assert_eq!(
            "ML-DSA-65".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::MlDsa65
        );
        assert!(matches!(
            "secp256k1".parse::<SignatureAlgorithm>(),
            Err(GeoCamError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_from_parts_rejects_mismatched_public_key() {
        let a = test_keypair(4);
        let b = test_keypair(5);
        let result = KeyPair::from_parts(a.secret_key().clone(), b.public_key().clone(), "x");
        assert!(matches!(result, Err(GeoCamError::KeyStore(_))));
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let keypair = test_keypair(9);
        let debug = format!("{:?}", keypair);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&hex::encode([9u8; 32])));
    }
}
