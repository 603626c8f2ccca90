use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};

use super::bits;
use super::params::{StegoParams, END_MARKER_LEN, OPAQUE};
use super::shares;
use crate::error::{GeoCamError, Result};

/// Alpha-channel LSB codec bound to one parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StegoCodec {
    params: StegoParams,
}

impl Default for StegoCodec {
    fn default() -> Self {
        Self {
            params: StegoParams::default(),
        }
    }
}

impl StegoCodec {
    pub fn new(params: StegoParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &StegoParams {
        &self.params
    }

    /// Symbol capacity of a `width` x `height` image.
    pub fn capacity(&self, width: u32, height: u32) -> usize {
        self.params.capacity(width as usize * height as usize)
    }

    /// Embed `text` into the alpha channel of a packed RGBA8 buffer in place.
    pub fn encode_rgba(&self, rgba: &mut [u8], text: &str) -> Result<()> {
        let params = &self.params;
        params.validate()?;
        if rgba.len() % 4 != 0 {
            return Err(GeoCamError::InvalidParameter(format!(
                "RGBA buffer length {} is not a multiple of 4",
                rgba.len()
            )));
        }

        let pixel_count = rgba.len() / 4;
        let units = bits::text_to_units(text, params.code_unit_size)?;
        let capacity = params.capacity(pixel_count);
        // capacity is 0 below the reserved pixel count, so this also rejects an
        // empty payload in an image too small for the end marker
        if units.len() > capacity || pixel_count < params.reserved_pixels() {
            return Err(GeoCamError::CapacityExceeded {
                required: units.len(),
                capacity,
            });
        }

        let chunks = bits::pack(&units, params.code_unit_size, params.t);
        let prime = params.prime();
        let values: Vec<u16> = if params.threshold > 1 {
            shares::split(&chunks, usize::from(params.threshold), prime)
        } else {
            chunks.iter().map(|&c| u16::from(c)).collect()
        };

        // the full alpha plane is staged so a rejected encode leaves `rgba` untouched
        let base = u16::from(params.base());
        let mut plane = vec![OPAQUE; pixel_count];
        for (&value, alpha) in values.iter().zip(plane.iter_mut()) {
            // base + (value mod prime) <= 255
            *alpha = (base + value % prime) as u8;
        }

        if first_opaque_run(plane.iter().copied()) != Some(values.len()) {
            return Err(GeoCamError::InvalidParameter(format!(
                "payload contains the end marker for t={} threshold={}",
                params.t, params.threshold
            )));
        }

        for (alpha, staged) in rgba.iter_mut().skip(3).step_by(4).zip(plane) {
            *alpha = staged;
        }

        tracing::debug!(
            symbols = units.len(),
            chunks = values.len(),
            capacity,
            t = params.t,
            "Embedded payload in alpha channel"
        );
        Ok(())
    }

    /// Recover the text embedded by [`encode_rgba`](Self::encode_rgba).
    ///
    /// Returns [`GeoCamError::PayloadNotFound`] when the buffer contains no end
    /// marker.
    pub fn decode_rgba(&self, rgba: &[u8]) -> Result<String> {
        let params = &self.params;
        params.validate()?;

        let end = find_end_marker(rgba).ok_or(GeoCamError::PayloadNotFound)?;
        let prime = i16::try_from(params.prime())
            .map_err(|_| GeoCamError::InvalidParameter("prime out of range".into()))?;
        let base = i16::from(params.base());

        let values: Vec<u16> = rgba
            .iter()
            .skip(3)
            .step_by(4)
            .take(end)
            .map(|&raw| (i16::from(raw) - base).rem_euclid(prime) as u16)
            .collect();

        let values = if params.threshold > 1 {
            shares::combine(&values, usize::from(params.threshold), params.prime())?
        } else {
            values
        };

        let units = bits::unpack(&values, params.code_unit_size, params.t);
        bits::units_to_text(&units, params.code_unit_size)
    }

    /// Load any supported image, embed `text` and emit an RGBA8 PNG.
    pub fn encode_image(&self, image_bytes: &[u8], text: &str) -> Result<Vec<u8>> {
        let mut rgba = load_rgba(image_bytes)?;
        self.encode_rgba(&mut rgba, text)?;
        write_png(rgba)
    }

    pub fn decode_image(&self, image_bytes: &[u8]) -> Result<String> {
        let rgba = load_rgba(image_bytes)?;
        self.decode_rgba(rgba.as_raw())
    }
}

/// Pixel index of the first run of [`END_MARKER_LEN`] opaque alpha bytes.
pub fn find_end_marker(rgba: &[u8]) -> Option<usize> {
    first_opaque_run(rgba.iter().skip(3).step_by(4).copied())
}

fn first_opaque_run(alphas: impl Iterator<Item = u8>) -> Option<usize> {
    let mut run = 0usize;
    for (index, alpha) in alphas.enumerate() {
        if alpha == OPAQUE {
            run += 1;
            if run == END_MARKER_LEN {
                return Some(index + 1 - END_MARKER_LEN);
            }
        } else {
            run = 0;
        }
    }
    None
}

fn load_rgba(image_bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| GeoCamError::ImageLoadFailure(e.to_string()))?;
    Ok(image.into_rgba8())
}

fn write_png(rgba: RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| GeoCamError::ImageEncodeFailure(e.to_string()))?;
    Ok(out)
}
