#![no_main]

//! Fuzz target for the alpha-channel decoder
//!
//! Treats the input as a raw RGBA buffer and decodes it with every `t`.
//! Decoding must never panic, whatever the alpha bytes hold.
//!
//! Run with: cargo +nightly fuzz run fuzz_stego_decode

use geocam_core::{StegoCodec, StegoParams};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rgba)) = data.split_first() else {
        return;
    };
    let t = selector % 7 + 1;
    let threshold = if selector & 0x80 != 0 { 2 } else { 1 };

    let Ok(params) = StegoParams::with_t(t) else {
        return;
    };
    let params = StegoParams { threshold, ..params };
    if let Ok(codec) = StegoCodec::new(params) {
        let _ = codec.decode_rgba(rgba);
    }
});
