//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geocam_core::{ExtensionValue, ImageInput};
use tracing::debug;

/// Build the default sealed output path from the source image path.
///
/// Transforms `dir/photo.jpg` into `dir/photo.sealed.png`.
pub fn build_output_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    image.with_file_name(format!("{stem}.sealed.png"))
}

/// Read an image from disk, keeping its path so the sidecar can be found.
pub fn load_image(path: &Path) -> Result<ImageInput> {
    let image = ImageInput::from_path(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    debug!(path = %path.display(), bytes = image.bytes().len(), "Read image");
    Ok(image)
}

/// Parse a `key=value` extension field. Numeric values become numbers.
pub fn parse_field(raw: &str) -> std::result::Result<(String, ExtensionValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("field key must not be empty".to_string());
    }

    let value = match value.parse::<f64>() {
        Ok(number) if number.is_finite() => ExtensionValue::Number(number),
        _ => ExtensionValue::Text(value.to_string()),
    };
    Ok((key.to_string(), value))
}

/// First 16 hex characters of a fingerprint, for display.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..16).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_output_path() {
        assert_eq!(
            build_output_path(Path::new("photo.jpg")),
            PathBuf::from("photo.sealed.png")
        );
        assert_eq!(
            build_output_path(Path::new("/tmp/shots/img.png")),
            PathBuf::from("/tmp/shots/img.sealed.png")
        );
        assert_eq!(
            build_output_path(Path::new("noext")),
            PathBuf::from("noext.sealed.png")
        );
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("lens=50mm").unwrap(),
            ("lens".to_string(), ExtensionValue::Text("50mm".into()))
        );
        assert_eq!(
            parse_field("iso=400").unwrap(),
            ("iso".to_string(), ExtensionValue::Number(400.0))
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), ExtensionValue::Text("a=b".into()))
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short_fingerprint("0123456789abcdef0123"), "0123456789abcdef");
        assert_eq!(short_fingerprint("abc"), "abc");
    }
}
