//! Codec parameters.

use serde::{Deserialize, Serialize};

use crate::error::{GeoCamError, Result};

/// Default payload bits per alpha byte.
pub const DEFAULT_T: u8 = 3;
/// Default share count per chunk group (no splitting).
pub const DEFAULT_THRESHOLD: u8 = 1;
/// Default symbol width: one UTF-16 code unit.
pub const DEFAULT_CODE_UNIT_SIZE: u8 = 16;
/// Consecutive opaque alpha bytes the decoder treats as end of message.
pub const END_MARKER_LEN: usize = 16;
/// Alpha value of the delimiter and of every unused pixel.
pub const OPAQUE: u8 = 255;

/// Immutable codec configuration, passed into every encode/decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StegoParams {
    /// Payload bits packed per carrier byte (1-7).
    pub t: u8,
    /// Shares per chunk group; 1 disables splitting.
    pub threshold: u8,
    /// Width in bits of one message symbol (8 or 16).
    pub code_unit_size: u8,
}

impl Default for StegoParams {
    fn default() -> Self {
        Self {
            t: DEFAULT_T,
            threshold: DEFAULT_THRESHOLD,
            code_unit_size: DEFAULT_CODE_UNIT_SIZE,
        }
    }
}

impl StegoParams {
    /// Default parameters with a custom `t`, validated.
    pub fn with_t(t: u8) -> Result<Self> {
        let params = Self {
            t,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=7).contains(&self.t) {
            return Err(GeoCamError::InvalidParameter(format!(
                "t must be in 1..=7, got {}",
                self.t
            )));
        }
        if !matches!(self.code_unit_size, 8 | 16) {
            return Err(GeoCamError::InvalidParameter(format!(
                "code unit size must be 8 or 16, got {}",
                self.code_unit_size
            )));
        }
        let prime = self.prime();
        if self.threshold == 0 || u16::from(self.threshold) >= prime {
            return Err(GeoCamError::InvalidParameter(format!(
                "threshold must be in 1..{prime} for t={}, got {}",
                self.t, self.threshold
            )));
        }
        Ok(())
    }

    /// Smallest prime greater than or equal to `2^t`.
    pub fn prime(&self) -> u16 {
        smallest_prime_at_least(1u16 << self.t.min(7))
    }

    /// First alpha value of the mapped range, `256 - prime`.
    pub fn base(&self) -> u8 {
        // prime <= 131 for t <= 7
        (256 - self.prime()) as u8
    }

    /// Length of the delimiter written after the last chunk.
    pub fn delimiter_len(&self) -> usize {
        3 * usize::from(self.threshold)
    }

    /// Pixels kept free at the end of the image for the end marker.
    pub fn reserved_pixels(&self) -> usize {
        END_MARKER_LEN.max(self.delimiter_len())
    }

    /// Alpha positions used by `symbols` message symbols.
    pub fn chunks_for(&self, symbols: usize) -> usize {
        (symbols * usize::from(self.code_unit_size)).div_ceil(usize::from(self.t))
    }

    /// Number of message symbols an image of `pixel_count` pixels can hold.
    pub fn capacity(&self, pixel_count: usize) -> usize {
        let usable = pixel_count.saturating_sub(self.reserved_pixels());
        usize::from(self.t) * usable / usize::from(self.code_unit_size)
    }
}

fn smallest_prime_at_least(n: u16) -> u16 {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

fn is_prime(n: u16) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primes_per_t() {
        let primes: Vec<u16> = (1..=7)
            .map(|t| StegoParams { t, ..Default::default() }.prime())
            .collect();
        assert_eq!(primes, vec![2, 5, 11, 17, 37, 67, 131]);
    }

    #[test]
    fn test_default_mapping_stays_below_opaque() {
        let params = StegoParams::default();
        assert_eq!(params.prime(), 11);
        assert_eq!(params.base(), 245);
        // largest 3-bit chunk maps to 252
        assert!(u16::from(params.base()) + 7 < u16::from(OPAQUE));
    }

    #[test]
    fn test_invalid_parameters() {
        for t in [0, 8, 200] {
            assert!(matches!(
                StegoParams::with_t(t),
                Err(GeoCamError::InvalidParameter(_))
            ));
        }

        let bad_unit = StegoParams {
            code_unit_size: 12,
            ..Default::default()
        };
        assert!(bad_unit.validate().is_err());

        let bad_threshold = StegoParams {
            threshold: 11,
            ..Default::default()
        };
        assert!(bad_threshold.validate().is_err());

        let zero_threshold = StegoParams {
            threshold: 0,
            ..Default::default()
        };
        assert!(zero_threshold.validate().is_err());
    }

    #[test]
    fn test_capacity_reserves_end_marker() {
        let params = StegoParams::default();
        // 100x100: 3 * (10000 - 16) / 16
        assert_eq!(params.capacity(10_000), 1872);
        assert_eq!(params.capacity(16), 0);
        assert_eq!(params.capacity(0), 0);
        assert!(params.chunks_for(1872) + END_MARKER_LEN <= 10_000);
    }
}
