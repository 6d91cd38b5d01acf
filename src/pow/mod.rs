//! Fixed-width big integers used for proof-of-work targets
//!
//! Targets are plain 256-bit unsigned integers. Products that can exceed 256
//! bits (retarget scaling, weighted averages) are computed in `U512` and
//! saturated back, so overflow is never silently truncated.

use crate::errors::HexError;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer, four little-endian 64-bit limbs
    pub struct U256(4);
}

construct_uint! {
    /// 512-bit companion used for intermediate products
    pub struct U512(8);
}

/// Widen a target into the 512-bit domain
#[inline]
pub fn widen(v: &U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(&v.0);
    U512(limbs)
}

/// Narrow back to 256 bits, saturating at `U256::MAX`
#[inline]
pub fn narrow_saturating(v: &U512) -> U256 {
    if v.0[4..].iter().any(|&limb| limb != 0) {
        return U256::MAX;
    }
    let mut limbs = [0u64; 4];
    limbs.copy_from_slice(&v.0[..4]);
    U256(limbs)
}

/// floor(value * mul / div) without intermediate truncation.
/// A zero divisor yields `U256::MAX`; callers clamp against a limit.
pub fn mul_div(value: &U256, mul: u64, div: u64) -> U256 {
    if div == 0 {
        return U256::MAX;
    }
    let wide = widen(value) * U512::from(mul) / U512::from(div);
    narrow_saturating(&wide)
}

/// Interpret 32 hash bytes as a little-endian integer
#[inline]
pub fn u256_from_le_bytes(bytes: &[u8; 32]) -> U256 {
    U256::from_little_endian(bytes)
}

#[inline]
pub fn u256_to_le_bytes(v: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    v.to_little_endian(&mut out);
    out
}

/// Parse a big-endian hex string (optional `0x`, up to 64 digits)
pub fn u256_from_hex(s: &str) -> Result<U256, HexError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() > 64 {
        return Err(HexError::TooLong {
            len: s.len(),
            max: 64,
        });
    }
    let padded = format!("{:0>64}", s);
    let bytes = hex::decode(&padded).map_err(|e| HexError::Invalid(e.to_string()))?;
    Ok(U256::from_big_endian(&bytes))
}

/// Render as 64 big-endian hex digits
pub fn u256_to_hex(v: &U256) -> String {
    let mut buf = [0u8; 32];
    v.to_big_endian(&mut buf);
    hex::encode(buf)
}
