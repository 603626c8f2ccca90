//! Polynomial share splitting for `threshold > 1`.
//!
//! Chunks are taken in groups of `k = threshold` (the last group may be
//! shorter). A group `m_0..m_{k-1}` is the coefficient list of a polynomial
//! over GF(prime) and is replaced by its evaluations at `x = 1..=k`:
//!
//! ```text
//! q_i = sum_j m_j * (i + 1)^j  mod prime
//! ```
//!
//! Each group of shares is a Vandermonde system in the coefficients. The
//! evaluation points are distinct and non-zero modulo `prime` because
//! `threshold < prime`, so the system always has a unique solution.

use crate::error::{GeoCamError, Result};

pub(crate) fn split(chunks: &[u8], threshold: usize, prime: u16) -> Vec<u16> {
    let p = u32::from(prime);
    let mut shares = Vec::with_capacity(chunks.len());

    for group in chunks.chunks(threshold) {
        for i in 0..group.len() {
            let x = (i as u32 + 1) % p;
            let mut power = 1u32;
            let mut sum = 0u32;
            for &m in group {
                sum = (sum + u32::from(m) % p * power) % p;
                power = power * x % p;
            }
            shares.push(sum as u16);
        }
    }
    shares
}

/// Recover the coefficients of every group of shares.
pub(crate) fn combine(shares: &[u16], threshold: usize, prime: u16) -> Result<Vec<u16>> {
    let mut values = Vec::with_capacity(shares.len());
    for group in shares.chunks(threshold) {
        values.extend(solve_vandermonde(group, prime)?);
    }
    Ok(values)
}

fn solve_vandermonde(shares: &[u16], prime: u16) -> Result<Vec<u16>> {
    let p = u32::from(prime);
    let k = shares.len();

    // augmented matrix [V | q]
    let mut rows: Vec<Vec<u32>> = (0..k)
        .map(|i| {
            let x = (i as u32 + 1) % p;
            let mut row = Vec::with_capacity(k + 1);
            let mut power = 1u32;
            for _ in 0..k {
                row.push(power);
                power = power * x % p;
            }
            row.push(u32::from(shares[i]) % p);
            row
        })
        .collect();

    for col in 0..k {
        let pivot = (col..k).find(|&r| rows[r][col] != 0).ok_or_else(|| {
            GeoCamError::InvalidParameter("share system is singular".into())
        })?;
        rows.swap(col, pivot);

        let inv = mod_inverse(rows[col][col], p);
        for entry in rows[col].iter_mut() {
            *entry = *entry * inv % p;
        }

        for r in 0..k {
            if r == col || rows[r][col] == 0 {
                continue;
            }
            let factor = rows[r][col];
            for c in col..=k {
                let sub = factor * rows[col][c] % p;
                rows[r][c] = (rows[r][c] + p - sub) % p;
            }
        }
    }

    Ok(rows.iter().map(|row| row[k] as u16).collect())
}

fn mod_inverse(a: u32, p: u32) -> u32 {
    // Fermat: a^(p-2) mod p
    let mut result = 1u32;
    let mut base = a % p;
    let mut exp = p - 2;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % p;
        }
        base = base * base % p;
        exp >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_combine_roundtrip() {
        let chunks: Vec<u8> = (0..50u8).map(|i| i % 8).collect();
        for threshold in 1..=10 {
            let shares = split(&chunks, threshold, 11);
            assert_eq!(shares.len(), chunks.len());
            assert!(shares.iter().all(|&s| s < 11));

            let back = combine(&shares, threshold, 11).unwrap();
            let expected: Vec<u16> = chunks.iter().map(|&c| u16::from(c)).collect();
            assert_eq!(back, expected, "threshold={threshold}");
        }
    }

    #[test]
    fn test_threshold_one_is_identity() {
        let chunks = vec![0u8, 3, 7, 1];
        assert_eq!(split(&chunks, 1, 11), vec![0, 3, 7, 1]);
    }

    #[test]
    fn test_known_group() {
        // m = [2, 1, 3] over GF(11): q(x) = 2 + x + 3x^2
        let shares = split(&[2, 1, 3], 3, 11);
        assert_eq!(shares, vec![6, 16 % 11, 32 % 11]);
    }

    #[test]
    fn test_changed_share_changes_coefficients() {
        let chunks = vec![1u8, 2, 3, 4, 5, 6];
        let mut shares = split(&chunks, 3, 11);
        shares[4] = (shares[4] + 1) % 11;
        let back = combine(&shares, 3, 11).unwrap();
        assert_ne!(back[3..], [4u16, 5, 6]);
        assert_eq!(back[..3], [1u16, 2, 3]);
    }

    #[test]
    fn test_mod_inverse() {
        for a in 1..131u32 {
            assert_eq!(a * mod_inverse(a, 131) % 131, 1);
        }
    }
}
