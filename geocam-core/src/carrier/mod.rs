//! Carriers that hold the signed payload in or next to an image.
//!
//! | Carrier | Location | Read cost | Survives re-encoding |
//! |---------|----------|-----------|----------------------|
//! | [`CommentCarrier`] | PNG `iTXt`/`tEXt`, JPEG `COM` | header parse | no |
//! | [`SidecarCarrier`] | `<image>.sig` file | one file read | n/a |
//! | [`SteganographicCarrier`] | alpha channel LSBs | full pixel decode | no, but any pixel edit is evident |
//!
//! Verification walks [`default_chain`] in order and stops at the first
//! carrier that yields a payload.

mod comment;
mod sidecar;
mod stego;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stego::StegoParams;

pub use comment::{CommentCarrier, COMMENT_KEYWORD, MAX_JPEG_COMMENT_LEN};
pub use sidecar::{sidecar_path, SidecarCarrier, SIDECAR_SUFFIX};
pub use stego::SteganographicCarrier;

/// Which carrier produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierKind {
    Steganographic,
    CommentField,
    SidecarFile,
    None,
}

impl fmt::Display for CarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Steganographic => "steganographic",
            Self::CommentField => "comment-field",
            Self::SidecarFile => "sidecar-file",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// One way of storing and finding a payload.
///
/// Implementations are stateless; one failing attempt never affects another.
pub trait CarrierStrategy: Send + Sync {
    fn kind(&self) -> CarrierKind;

    /// Look for a payload. `Ok(None)` means this carrier holds nothing.
    fn try_extract(&self, image: &ImageInput) -> Result<Option<Vec<u8>>>;

    /// Store `payload` in this carrier, updating `image` in place.
    fn embed(&self, image: &mut ImageInput, payload: &[u8]) -> Result<()>;
}

/// Image bytes plus the context some carriers need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInput {
    bytes: Vec<u8>,
    path: Option<PathBuf>,
    sidecar: Option<Vec<u8>>,
}

impl ImageInput {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            path: None,
            sidecar: None,
        }
    }

    /// Read an image from disk. Its sidecar, if any, is found through the path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self {
            bytes,
            path: Some(path.to_path_buf()),
            sidecar: None,
        })
    }

    /// Attach sidecar contents held in memory.
    pub fn with_sidecar_bytes(mut self, sidecar: impl Into<Vec<u8>>) -> Self {
        self.sidecar = Some(sidecar.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn sidecar(&self) -> Option<&[u8]> {
        self.sidecar.as_deref()
    }

    pub(crate) fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    pub(crate) fn set_sidecar(&mut self, sidecar: Vec<u8>) {
        self.sidecar = Some(sidecar);
    }

    /// Write the image to `path`, plus `<path>.sig` when a sidecar is attached.
    pub fn persist(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)?;
        if let Some(sidecar) = &self.sidecar {
            std::fs::write(sidecar_path(path), sidecar)?;
        }
        self.path = Some(path.to_path_buf());
        Ok(())
    }
}

/// Carriers in verification order: comment field, sidecar file, then the
/// pixel-level decode.
pub fn default_chain(params: StegoParams) -> Result<Vec<Box<dyn CarrierStrategy>>> {
    Ok(vec![
        Box::new(CommentCarrier),
        Box::new(SidecarCarrier),
        Box::new(SteganographicCarrier::new(params)?),
    ])
}
