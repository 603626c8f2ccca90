use image::ImageFormat;

use super::{CarrierKind, CarrierStrategy, ImageInput};
use crate::error::{GeoCamError, Result};
use crate::stego::{StegoCodec, StegoParams};

/// Payload hidden in the alpha channel by [`StegoCodec`].
///
/// Lossy formats cannot hold the payload, so JPEG and WebP inputs are reported
/// as absent without decoding any pixels. Embedding always produces a PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteganographicCarrier {
    codec: StegoCodec,
}

impl SteganographicCarrier {
    pub fn new(params: StegoParams) -> Result<Self> {
        Ok(Self {
            codec: StegoCodec::new(params)?,
        })
    }

    pub fn codec(&self) -> &StegoCodec {
        &self.codec
    }
}

fn is_lossy(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(ImageFormat::Jpeg | ImageFormat::WebP)
    )
}

impl CarrierStrategy for SteganographicCarrier {
    fn kind(&self) -> CarrierKind {
        CarrierKind::Steganographic
    }

    fn try_extract(&self, image: &ImageInput) -> Result<Option<Vec<u8>>> {
        if is_lossy(image.bytes()) {
            tracing::debug!("Lossy image format cannot carry an alpha payload");
            return Ok(None);
        }

        match self.codec.decode_image(image.bytes()) {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text.into_bytes())),
            Err(GeoCamError::PayloadNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn embed(&self, image: &mut ImageInput, payload: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| GeoCamError::InvalidParameter(format!("payload is not UTF-8: {e}")))?;
        let encoded = self.codec.encode_image(image.bytes(), text)?;
        image.set_bytes(encoded);
        Ok(())
    }
}
