//! GeoCam Core - authenticity pipeline for geotagged photographs
//!
//! Binds a photograph's capture metadata (device model, time, location) to its
//! pixels with an asymmetric signature, and later proves the image unaltered.
//!
//! # Pipeline
//!
//! - **Capture**: [`CaptureMetadata`] → canonical bytes → [`SignedPayload`]
//!   → hidden in the alpha channel by [`StegoCodec`] (plus optional comment
//!   field and sidecar copies)
//! - **Verification**: [`VerificationEngine`] tries the comment field, the
//!   sidecar file, then the pixel decode, parses the payload and checks its
//!   signature
//!
//! # Example
//!
//! ```no_run
//! use geocam_core::{
//!     seal_image, CaptureMetadata, ImageInput, KeyPair, SealOptions, SignatureAlgorithm,
//!     VerificationEngine,
//! };
//!
//! # fn example(png: Vec<u8>) -> geocam_core::Result<()> {
//! let keypair = KeyPair::generate(SignatureAlgorithm::Ed25519)?;
//! let metadata = CaptureMetadata::captured_now("Pixel 8")
//!     .location(48.8584, 2.2945)
//!     .build()?;
//!
//! let sealed = seal_image(ImageInput::from_bytes(png), &metadata, &keypair, &SealOptions::default())?;
//!
//! let result = VerificationEngine::new().verify(&sealed.image);
//! assert!(result.is_authentic());
//! # Ok(())
//! # }
//! ```

pub mod carrier;
pub mod contract;
pub mod error;
pub mod keystore;
pub mod metadata;
pub mod payload;
pub mod seal;
pub mod signer;
pub mod stego;
pub mod verify;

#[cfg(feature = "async")]
pub mod host;

#[cfg(feature = "network")]
pub mod remote;

// Re-export main types for convenience
pub use carrier::{
    default_chain, sidecar_path, CarrierKind, CarrierStrategy, CommentCarrier, ImageInput,
    SidecarCarrier, SteganographicCarrier,
};
pub use contract::{
    DecodedInfo, RemoteVerificationResult, VerifyImageRequest, VerifyImageResponse,
};
pub use error::{GeoCamError, Result, MAX_PAYLOAD_SIZE};
pub use keystore::{load_or_generate, FileKeyStore, KeyStore, MemoryKeyStore};
pub use metadata::{canonicalize, CaptureMetadata, ExtensionValue, Location};
pub use payload::{SignatureEnvelope, SignedPayload};
pub use seal::{seal_image, SealOptions, SealedImage};
pub use signer::{KeyPair, PublicKey, SignatureAlgorithm, ZeroizingSecretKey};
pub use stego::{StegoCodec, StegoParams};
pub use verify::{
    ErrorKind, VerificationEngine, VerificationResult, VerificationState, NO_PAYLOAD_MESSAGE,
};

#[cfg(feature = "async")]
pub use host::{EncodeHost, EncodeRequest, EncodeResponse, HostConfig};

#[cfg(feature = "network")]
pub use remote::{RemoteVerifier, RemoteVerifierConfig, VerificationService};
