//! Least-significant-bit steganography in the alpha channel.
//!
//! # Layout
//!
//! For pixel `i` of a packed RGBA8 buffer the carrier byte is `rgba[i * 4 + 3]`,
//! in raster order from the first pixel:
//!
//! 1. The message is split into `code_unit_size`-bit symbols (UTF-16 units by
//!    default) and repacked LSB-first into `t`-bit chunks.
//! 2. Each chunk `v` is written as `(256 - prime) + (v mod prime)`, where
//!    `prime` is the smallest prime `>= 2^t`. These values sit just below 255,
//!    so the alpha channel still looks opaque.
//! 3. A delimiter of `threshold * 3` bytes equal to 255 follows, then every
//!    remaining alpha byte is set to 255.
//!
//! The decoder stops at the first run of 16 alpha bytes equal to 255. Images
//! must be stored losslessly (PNG) for the payload to survive.
//!
//! `threshold > 1` replaces each group of chunks with polynomial shares, see
//! `stego::shares`.

mod bits;
mod codec;
mod params;
mod shares;

pub use codec::{find_end_marker, StegoCodec};
pub use params::{
    StegoParams, DEFAULT_CODE_UNIT_SIZE, DEFAULT_T, DEFAULT_THRESHOLD, END_MARKER_LEN, OPAQUE,
};
