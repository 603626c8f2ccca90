//! Symbol <-> chunk bit packing.
//!
//! Symbols form one continuous LSB-first bit stream, so chunks straddle symbol
//! boundaries whenever the code unit size is not a multiple of `t`. The final
//! chunk is zero-padded.

use crate::error::{GeoCamError, Result};

/// Split `text` into code units of `code_unit_size` bits.
pub(crate) fn text_to_units(text: &str, code_unit_size: u8) -> Result<Vec<u16>> {
    match code_unit_size {
        16 => Ok(text.encode_utf16().collect()),
        8 => Ok(text.bytes().map(u16::from).collect()),
        other => Err(GeoCamError::InvalidParameter(format!(
            "unsupported code unit size {other}"
        ))),
    }
}

/// Rebuild text from code units. Invalid sequences are replaced, never dropped,
/// so corrupted input always yields a different string.
pub(crate) fn units_to_text(units: &[u16], code_unit_size: u8) -> Result<String> {
    match code_unit_size {
        16 => Ok(String::from_utf16_lossy(units)),
        8 => {
            let bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        other => Err(GeoCamError::InvalidParameter(format!(
            "unsupported code unit size {other}"
        ))),
    }
}

pub(crate) fn pack(units: &[u16], code_unit_size: u8, t: u8) -> Vec<u8> {
    let t = u32::from(t);
    let unit_bits = u32::from(code_unit_size);
    let mask = (1u64 << t) - 1;

    let mut chunks = Vec::with_capacity((units.len() * unit_bits as usize).div_ceil(t as usize));
    let mut acc: u64 = 0;
    let mut bits: u32 = 0;

    for &unit in units {
        acc |= u64::from(unit) << bits;
        bits += unit_bits;
        while bits >= t {
            chunks.push((acc & mask) as u8);
            acc >>= t;
            bits -= t;
        }
    }
    if bits > 0 {
        chunks.push((acc & mask) as u8);
    }
    chunks
}

/// Inverse of [`pack`].
///
/// Values may exceed `t` bits (decoded residues range up to `prime - 1`);
/// the excess carries into the following position instead of being masked
/// away, and any non-zero residue after the last full symbol is emitted as
/// trailing symbols.
pub(crate) fn unpack(values: &[u16], code_unit_size: u8, t: u8) -> Vec<u16> {
    let t = u32::from(t);
    let unit_bits = u32::from(code_unit_size);
    let unit_mask = (1u64 << unit_bits) - 1;

    let mut units = Vec::with_capacity(values.len() * t as usize / unit_bits as usize + 1);
    let mut acc: u64 = 0;
    let mut bits: u32 = 0;

    for &value in values {
        acc += u64::from(value) << bits;
        bits += t;
        while bits >= unit_bits {
            units.push((acc & unit_mask) as u16);
            acc >>= unit_bits;
            bits -= unit_bits;
        }
    }
    while acc != 0 {
        units.push((acc & unit_mask) as u16);
        acc >>= unit_bits;
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_straddles_symbol_boundaries() {
        // 16-bit unit, t=3: 6 chunks (18 bits, 2 padding)
        let chunks = pack(&[0xFFFF], 16, 3);
        assert_eq!(chunks, vec![7, 7, 7, 7, 7, 1]);

        let chunks = pack(&[0x0041, 0x0042], 16, 3);
        assert_eq!(chunks.len(), 11);
        let values: Vec<u16> = chunks.iter().map(|&c| u16::from(c)).collect();
        assert_eq!(unpack(&values, 16, 3), vec![0x0041, 0x0042]);
    }

    #[test]
    fn test_pack_unpack_all_t_and_unit_sizes() {
        let text = "{\"deviceModel\":\"Caméra ✓\"}";
        for unit in [8u8, 16] {
            let units = text_to_units(text, unit).unwrap();
            for t in 1..=7u8 {
                let values: Vec<u16> =
                    pack(&units, unit, t).into_iter().map(u16::from).collect();
                let back = unpack(&values, unit, t);
                assert_eq!(units_to_text(&back, unit).unwrap(), text, "t={t} unit={unit}");
            }
        }
    }

    #[test]
    fn test_overflowing_value_changes_output() {
        let units = text_to_units("A", 16).unwrap();
        let mut values: Vec<u16> = pack(&units, 16, 3).into_iter().map(u16::from).collect();
        // residue 8 does not fit in 3 bits
        values[1] += 8;
        assert_ne!(unpack(&values, 16, 3), units);
    }

    #[test]
    fn test_trailing_residue_is_emitted() {
        let units = text_to_units("A", 16).unwrap();
        let mut values: Vec<u16> = pack(&units, 16, 3).into_iter().map(u16::from).collect();
        let last = values.len() - 1;
        values[last] |= 0b100;
        let out = unpack(&values, 16, 3);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(pack(&[], 16, 3).is_empty());
        assert!(unpack(&[], 16, 3).is_empty());
    }
}
