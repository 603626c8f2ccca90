//! Capture-time pipeline: canonicalize, sign, embed.

use crate::carrier::{CarrierStrategy, CommentCarrier, ImageInput, SidecarCarrier, SteganographicCarrier};
use crate::error::Result;
use crate::metadata::CaptureMetadata;
use crate::payload::SignedPayload;
use crate::signer::KeyPair;
use crate::stego::StegoParams;

/// Which carriers receive the payload. The steganographic carrier is always
/// used; the other two are optional secondary copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealOptions {
    pub params: StegoParams,
    pub comment: bool,
    pub sidecar: bool,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            params: StegoParams::default(),
            comment: false,
            sidecar: false,
        }
    }
}

/// Sealed image plus the payload it carries.
#[derive(Debug, Clone)]
pub struct SealedImage {
    pub image: ImageInput,
    pub payload: SignedPayload,
    pub payload_json: String,
}

/// Sign `metadata` and embed the payload into `image`.
///
/// The pixel embed runs first because it re-encodes the image as PNG; the
/// comment chunk is then added to that PNG.
pub fn seal_image(
    mut image: ImageInput,
    metadata: &CaptureMetadata,
    keypair: &KeyPair,
    options: &SealOptions,
) -> Result<SealedImage> {
    let payload = SignedPayload::sign(metadata, keypair)?;
    let payload_json = payload.to_json()?;

    SteganographicCarrier::new(options.params)?.embed(&mut image, payload_json.as_bytes())?;
    if options.comment {
        CommentCarrier.embed(&mut image, payload_json.as_bytes())?;
    }
    if options.sidecar {
        SidecarCarrier.embed(&mut image, payload_json.as_bytes())?;
    }

    tracing::info!(
        fingerprint = %keypair.fingerprint(),
        payload_len = payload_json.len(),
        comment = options.comment,
        sidecar = options.sidecar,
        "Sealed image"
    );

    Ok(SealedImage {
        image,
        payload,
        payload_json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierKind;
    use crate::verify::VerificationEngine;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn blank_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::new_rgba8(width, height)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn metadata() -> CaptureMetadata {
        CaptureMetadata::builder("TestCam", "2024-01-01T00:00:00Z")
            .location(10.0, 20.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_seal_then_verify_each_carrier() {
        let keypair = KeyPair::from_ed25519_seed(&[5; 32], "install");
        let options = SealOptions {
            comment: true,
            sidecar: true,
            ..Default::default()
        };
        let sealed = seal_image(
            ImageInput::from_bytes(blank_png(80, 80)),
            &metadata(),
            &keypair,
            &options,
        )
        .unwrap();

        let engine = VerificationEngine::new();
        let result = engine.verify(&sealed.image);
        assert!(result.is_authentic());
        assert_eq!(result.carrier_used, CarrierKind::CommentField);

        // pixels alone are enough
        let pixels_only = ImageInput::from_bytes(sealed.image.bytes().to_vec());
        let engine = VerificationEngine::with_carriers(vec![Box::new(
            SteganographicCarrier::default(),
        )]);
        let result = engine.verify(&pixels_only);
        assert!(result.is_authentic());
        assert_eq!(result.decoded_metadata.unwrap(), metadata());
    }

    #[test]
    fn test_seal_too_small_image() {
        let keypair = KeyPair::from_ed25519_seed(&[5; 32], "install");
        let result = seal_image(
            ImageInput::from_bytes(blank_png(8, 8)),
            &metadata(),
            &keypair,
            &SealOptions::default(),
        );
        assert!(matches!(
            result,
            Err(crate::error::GeoCamError::CapacityExceeded { .. })
        ));
    }
}
