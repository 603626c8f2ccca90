//! Payload stored verbatim in the image's comment field.
//!
//! - PNG: an `iTXt` chunk with keyword `Comment`, spliced in ahead of the image
//!   data; all other chunks are kept as they are. `tEXt` and `zTXt` chunks with
//!   the same keyword are read as well.
//! - JPEG: a `COM` segment placed after the leading `APPn` segments.
//!
//! Both are stripped by most re-encoding tools, so this carrier is a fast but
//! weak signal.

use std::io::Cursor;

use image::ImageFormat;
use png::text_metadata::{EncodableTextChunk, ITXtChunk};

use super::{CarrierKind, CarrierStrategy, ImageInput};
use crate::error::{GeoCamError, Result};

/// Keyword of the PNG text chunk holding the payload.
pub const COMMENT_KEYWORD: &str = "Comment";

/// Largest JPEG `COM` body (segment length is a u16 that counts itself).
pub const MAX_JPEG_COMMENT_LEN: usize = u16::MAX as usize - 2;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const COM: u8 = 0xFE;

#[derive(Debug, Clone, Copy, Default)]
pub struct CommentCarrier;

impl CarrierStrategy for CommentCarrier {
    fn kind(&self) -> CarrierKind {
        CarrierKind::CommentField
    }

    fn try_extract(&self, image: &ImageInput) -> Result<Option<Vec<u8>>> {
        let comment = match image::guess_format(image.bytes()) {
            Ok(ImageFormat::Png) => read_png_comment(image.bytes())?,
            Ok(ImageFormat::Jpeg) => read_jpeg_comment(image.bytes())?,
            _ => None,
        };
        Ok(comment.filter(|bytes| !bytes.is_empty()))
    }

    fn embed(&self, image: &mut ImageInput, payload: &[u8]) -> Result<()> {
        let updated = match image::guess_format(image.bytes()) {
            Ok(ImageFormat::Png) => {
                let text = String::from_utf8(payload.to_vec()).map_err(|e| {
                    GeoCamError::InvalidParameter(format!("payload is not UTF-8: {e}"))
                })?;
                write_png_comment(image.bytes(), text)?
            }
            Ok(ImageFormat::Jpeg) => write_jpeg_comment(image.bytes(), payload)?,
            Ok(other) => {
                return Err(GeoCamError::InvalidParameter(format!(
                    "{other:?} images have no comment field"
                )))
            }
            Err(e) => return Err(GeoCamError::ImageLoadFailure(e.to_string())),
        };
        image.set_bytes(updated);
        Ok(())
    }
}

fn read_png_comment(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let reader = decoder
        .read_info()
        .map_err(|e| GeoCamError::ImageLoadFailure(e.to_string()))?;
    let info = reader.info();

    for chunk in &info.utf8_text {
        if chunk.keyword == COMMENT_KEYWORD {
            let text = chunk
                .get_text()
                .map_err(|e| GeoCamError::ImageLoadFailure(e.to_string()))?;
            return Ok(Some(text.into_bytes()));
        }
    }
    for chunk in &info.uncompressed_latin1_text {
        if chunk.keyword == COMMENT_KEYWORD {
            return Ok(Some(chunk.text.clone().into_bytes()));
        }
    }
    for chunk in &info.compressed_latin1_text {
        if chunk.keyword == COMMENT_KEYWORD {
            let text = chunk
                .get_text()
                .map_err(|e| GeoCamError::ImageLoadFailure(e.to_string()))?;
            return Ok(Some(text.into_bytes()));
        }
    }
    Ok(None)
}

/// Rewrite a PNG chunk stream with `text` as its only `Comment` chunk.
///
/// Every other chunk (image data, colour profile, physical dimensions, other
/// text) is copied byte for byte. The new `iTXt` chunk goes right before the
/// first `IDAT` so the header pass of a decoder sees it.
fn write_png_comment(bytes: &[u8], text: String) -> Result<Vec<u8>> {
    let malformed = |msg: &str| GeoCamError::ImageLoadFailure(format!("malformed PNG: {msg}"));
    let chunks = bytes
        .strip_prefix(&PNG_SIGNATURE)
        .ok_or_else(|| malformed("missing signature"))?;

    let mut comment = Vec::with_capacity(text.len() + 32);
    ITXtChunk::new(COMMENT_KEYWORD, text)
        .encode(&mut comment)
        .map_err(|e| GeoCamError::ImageEncodeFailure(e.to_string()))?;

    let mut out = Vec::with_capacity(bytes.len() + comment.len());
    out.extend_from_slice(&PNG_SIGNATURE);

    let mut inserted = false;
    let mut pos = 0;
    while pos < chunks.len() {
        let Some(header) = chunks.get(pos..pos + 8) else {
            return Err(malformed("truncated chunk header"));
        };
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = &header[4..8];
        // length, type, data, crc
        let end = pos
            .checked_add(len + 12)
            .filter(|&end| end <= chunks.len())
            .ok_or_else(|| malformed("chunk length out of range"))?;
        let data = &chunks[pos + 8..pos + 8 + len];

        if kind == b"IDAT" && !inserted {
            out.extend_from_slice(&comment);
            inserted = true;
        }
        if !is_comment_chunk(kind, data) {
            out.extend_from_slice(&chunks[pos..end]);
        }
        pos = end;
        if kind == b"IEND" {
            break;
        }
    }

    if !inserted {
        return Err(malformed("no image data"));
    }
    Ok(out)
}

fn is_comment_chunk(kind: &[u8], data: &[u8]) -> bool {
    matches!(kind, b"tEXt" | b"zTXt" | b"iTXt")
        && data.split(|&b| b == 0).next() == Some(COMMENT_KEYWORD.as_bytes())
}

/// One marker segment of a JPEG header.
struct Segment {
    marker: u8,
    /// Byte range of the whole segment, marker included.
    start: usize,
    end: usize,
    /// Offset of the segment body, after the length field.
    body: usize,
}

/// Walk the segments between SOI and SOS. The returned offset is where the
/// SOS segment (or EOI) begins; everything from there on is copied verbatim.
fn jpeg_segments(bytes: &[u8]) -> Result<(Vec<Segment>, usize)> {
    let malformed = |msg: &str| GeoCamError::ImageLoadFailure(format!("malformed JPEG: {msg}"));

    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != SOI {
        return Err(malformed("missing SOI"));
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        if pos + 1 >= bytes.len() {
            return Err(malformed("truncated header"));
        }
        if bytes[pos] != 0xFF {
            return Err(malformed("expected marker"));
        }
        // fill bytes
        let mut marker_pos = pos + 1;
        while marker_pos < bytes.len() && bytes[marker_pos] == 0xFF {
            marker_pos += 1;
        }
        let Some(&marker) = bytes.get(marker_pos) else {
            return Err(malformed("truncated marker"));
        };

        if marker == SOS || marker == EOI {
            return Ok((segments, pos));
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            segments.push(Segment {
                marker,
                start: pos,
                end: marker_pos + 1,
                body: marker_pos + 1,
            });
            pos = marker_pos + 1;
            continue;
        }

        let len_pos = marker_pos + 1;
        let Some(len_bytes) = bytes.get(len_pos..len_pos + 2) else {
            return Err(malformed("truncated segment length"));
        };
        let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        if len < 2 || len_pos + len > bytes.len() {
            return Err(malformed("segment length out of range"));
        }
        let end = len_pos + len;
        segments.push(Segment {
            marker,
            start: pos,
            end,
            body: len_pos + 2,
        });
        pos = end;
    }
}

fn read_jpeg_comment(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let (segments, _) = jpeg_segments(bytes)?;
    Ok(segments
        .iter()
        .filter(|s| s.marker == COM)
        .map(|s| bytes[s.body..s.end].to_vec())
        .find(|body| !body.is_empty()))
}

fn write_jpeg_comment(bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_JPEG_COMMENT_LEN {
        return Err(GeoCamError::CapacityExceeded {
            required: payload.len(),
            capacity: MAX_JPEG_COMMENT_LEN,
        });
    }
    let (segments, scan_start) = jpeg_segments(bytes)?;

    let mut comment = Vec::with_capacity(payload.len() + 4);
    comment.extend_from_slice(&[0xFF, COM]);
    // bounded by MAX_JPEG_COMMENT_LEN above
    comment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    comment.extend_from_slice(payload);

    let mut out = Vec::with_capacity(bytes.len() + comment.len());
    out.extend_from_slice(&bytes[..2]);

    let mut inserted = false;
    for segment in &segments {
        if segment.marker == COM {
            continue;
        }
        let is_app = (0xE0..=0xEF).contains(&segment.marker);
        if !is_app && !inserted {
            out.extend_from_slice(&comment);
            inserted = true;
        }
        out.extend_from_slice(&bytes[segment.start..segment.end]);
    }
    if !inserted {
        out.extend_from_slice(&comment);
    }
    out.extend_from_slice(&bytes[scan_start..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, RgbaImage};

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn jpeg_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::new_rgb8(16, 16)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    #[test]
    fn test_png_comment_roundtrip_preserves_pixels() {
        let source = RgbaImage::from_fn(20, 10, |x, y| {
            image::Rgba([x as u8, y as u8, (x * y) as u8, 200 + (x % 50) as u8])
        });
        let original = png_bytes(DynamicImage::ImageRgba8(source));
        let mut image = ImageInput::from_bytes(original.clone());

        assert_eq!(CommentCarrier.try_extract(&image).unwrap(), None);
        CommentCarrier.embed(&mut image, "{\"k\":\"é\"}".as_bytes()).unwrap();
        assert_eq!(
            CommentCarrier.try_extract(&image).unwrap(),
            Some("{\"k\":\"é\"}".as_bytes().to_vec())
        );

        let before = image::load_from_memory(&original).unwrap();
        let after = image::load_from_memory(image.bytes()).unwrap();
        assert_eq!(before.dimensions(), after.dimensions());
        assert_eq!(before.to_rgba8().as_raw(), after.to_rgba8().as_raw());
    }

    /// Chunk types of a PNG, in file order.
    fn chunk_types(bytes: &[u8]) -> Vec<String> {
        let mut types = Vec::new();
        let mut pos = 8;
        while pos + 8 <= bytes.len() {
            let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
            types.push(String::from_utf8_lossy(&bytes[pos + 4..pos + 8]).into_owned());
            pos += len + 12;
        }
        types
    }

    #[test]
    fn test_png_comment_keeps_ancillary_chunks() {
        let mut original = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut original, 4, 4);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_source_gamma(png::ScaledFloat::new(0.45455));
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: 2835,
                yppu: 2835,
                unit: png::Unit::Meter,
            }));
            encoder
                .add_text_chunk("Author".to_string(), "field team".to_string())
                .unwrap();
            encoder
                .add_ztxt_chunk("Comment".to_string(), "stale".to_string())
                .unwrap();
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[7u8; 4 * 4 * 4]).unwrap();
            writer.finish().unwrap();
        }

        let mut image = ImageInput::from_bytes(original.clone());
        assert_eq!(
            CommentCarrier.try_extract(&image).unwrap(),
            Some(b"stale".to_vec())
        );
        CommentCarrier.embed(&mut image, b"fresh").unwrap();
        assert_eq!(
            CommentCarrier.try_extract(&image).unwrap(),
            Some(b"fresh".to_vec())
        );

        let before = chunk_types(&original);
        let after = chunk_types(image.bytes());
        for kind in ["gAMA", "pHYs", "tEXt", "IDAT", "IEND"] {
            assert!(after.iter().any(|t| t == kind), "{kind} dropped: {after:?}");
        }
        assert!(!after.iter().any(|t| t == "zTXt"));
        assert_eq!(after.len(), before.len());
        let idat = after.iter().position(|t| t == "IDAT").unwrap();
        assert_eq!(after[idat - 1], "iTXt");

        let decoded = image::load_from_memory(image.bytes()).unwrap();
        assert_eq!(decoded.to_rgba8().as_raw(), &vec![7u8; 64]);
    }

    #[test]
    fn test_png_without_image_data_is_load_failure() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        // IEND only
        bytes.extend_from_slice(&[0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
        assert!(matches!(
            write_png_comment(&bytes, "x".into()),
            Err(GeoCamError::ImageLoadFailure(_))
        ));
    }

    #[test]
    fn test_png_comment_replaced_not_duplicated() {
        let mut image = ImageInput::from_bytes(png_bytes(DynamicImage::new_rgb8(8, 8)));
        CommentCarrier.embed(&mut image, b"first").unwrap();
        CommentCarrier.embed(&mut image, b"second").unwrap();
        assert_eq!(
            CommentCarrier.try_extract(&image).unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[test]
    fn test_jpeg_comment_roundtrip() {
        let mut image = ImageInput::from_bytes(jpeg_bytes());
        assert_eq!(CommentCarrier.try_extract(&image).unwrap(), None);

        CommentCarrier.embed(&mut image, b"{\"a\":1}").unwrap();
        assert_eq!(
            CommentCarrier.try_extract(&image).unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
        // still a decodable JPEG
        let decoded = image::load_from_memory(image.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));

        CommentCarrier.embed(&mut image, b"{\"a\":2}").unwrap();
        assert_eq!(
            CommentCarrier.try_extract(&image).unwrap(),
            Some(b"{\"a\":2}".to_vec())
        );
    }

    #[test]
    fn test_jpeg_comment_too_large() {
        let mut image = ImageInput::from_bytes(jpeg_bytes());
        let payload = vec![b'x'; MAX_JPEG_COMMENT_LEN + 1];
        assert!(matches!(
            CommentCarrier.embed(&mut image, &payload),
            Err(GeoCamError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_unknown_format_is_absent() {
        let image = ImageInput::from_bytes(b"plain text, not an image".to_vec());
        assert_eq!(CommentCarrier.try_extract(&image).unwrap(), None);
    }

    #[test]
    fn test_truncated_jpeg_is_load_failure() {
        let mut bytes = jpeg_bytes();
        bytes.truncate(8);
        let image = ImageInput::from_bytes(bytes);
        assert!(matches!(
            CommentCarrier.try_extract(&image),
            Err(GeoCamError::ImageLoadFailure(_))
        ));
    }
}
