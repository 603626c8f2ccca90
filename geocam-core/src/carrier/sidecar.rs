use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{CarrierKind, CarrierStrategy, ImageInput};
use crate::error::Result;

/// Suffix appended to the image file name.
pub const SIDECAR_SUFFIX: &str = "sig";

/// Sidecar location for an image: `photo.png` -> `photo.png.sig`.
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = OsString::from(image.as_os_str());
    name.push(".");
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Payload JSON in a companion file next to the image.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarCarrier;

impl CarrierStrategy for SidecarCarrier {
    fn kind(&self) -> CarrierKind {
        CarrierKind::SidecarFile
    }

    fn try_extract(&self, image: &ImageInput) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = image.sidecar() {
            return Ok(non_empty(bytes.to_vec()));
        }

        let Some(path) = image.path() else {
            return Ok(None);
        };
        let sidecar = sidecar_path(path);
        match std::fs::read(&sidecar) {
            Ok(bytes) => {
                tracing::debug!(path = %sidecar.display(), "Read sidecar file");
                Ok(non_empty(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn embed(&self, image: &mut ImageInput, payload: &[u8]) -> Result<()> {
        image.set_sidecar(payload.to_vec());
        Ok(())
    }
}

fn non_empty(bytes: Vec<u8>) -> Option<Vec<u8>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/photo.png")),
            PathBuf::from("/tmp/photo.png.sig")
        );
        assert_eq!(sidecar_path(Path::new("raw")), PathBuf::from("raw.sig"));
    }

    #[test]
    fn test_in_memory_sidecar() {
        let carrier = SidecarCarrier;
        let mut image = ImageInput::from_bytes(vec![1, 2, 3]);
        assert_eq!(carrier.try_extract(&image).unwrap(), None);

        carrier.embed(&mut image, b"{\"a\":1}").unwrap();
        assert_eq!(
            carrier.try_extract(&image).unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
        // image bytes are untouched
        assert_eq!(image.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_sidecar_file_next_to_image() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("photo.jpg");
        std::fs::write(&image_path, b"jpeg").unwrap();

        let image = ImageInput::from_path(&image_path).unwrap();
        assert_eq!(SidecarCarrier.try_extract(&image).unwrap(), None);

        std::fs::write(dir.path().join("photo.jpg.sig"), b"payload").unwrap();
        assert_eq!(
            SidecarCarrier.try_extract(&image).unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[test]
    fn test_blank_sidecar_is_absent() {
        let image = ImageInput::from_bytes(vec![]).with_sidecar_bytes(b"  \n".to_vec());
        assert_eq!(SidecarCarrier.try_extract(&image).unwrap(), None);
    }
}
