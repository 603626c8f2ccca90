#![no_main]

//! Fuzz target for signed payload parsing
//!
//! Arbitrary bytes go through the same parse and verify steps the
//! verification engine applies to an extracted payload.
//!
//! Run with: cargo +nightly fuzz run fuzz_payload_parse

use geocam_core::{SignedPayload, VerificationEngine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = SignedPayload::from_json(data) {
        let _ = payload.verify_with(None);
        let _ = payload.metadata();
    }

    // Image decoding and the carrier chain must also hold up
    let _ = VerificationEngine::new().verify_bytes(data);
});
