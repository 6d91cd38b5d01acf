//! Compact ("nBits") target encoding
//!
//! A 32-bit floating-point-like form of a 256-bit target: one byte of size
//! (the byte length of the full value) and a 3-byte mantissa whose top bit is
//! a sign flag. The bit pattern is consensus-critical, so both directions must
//! stay exactly as below.

use crate::errors::HexError;
use crate::pow::U256;
use std::fmt;
use std::str::FromStr;

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// A target in compact form
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompactTarget(pub u32);

/// Result of expanding a compact target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedTarget {
    pub value: U256,
    /// Sign bit set on a non-zero mantissa
    pub negative: bool,
    /// Encoded value needs more than 256 bits
    pub overflow: bool,
}

impl DecodedTarget {
    /// True when the value can be used as a threshold at all
    pub fn is_valid(&self) -> bool {
        !self.negative && !self.overflow && !self.value.is_zero()
    }
}

impl CompactTarget {
    pub fn to_u32(self) -> u32 {
        self.0
    }

    fn size(self) -> u32 {
        self.0 >> 24
    }

    /// Expand into a full target plus the negative/overflow flags. Total over all inputs.
    pub fn decode(self) -> DecodedTarget {
        let size = self.size();
        let word = self.0 & MANTISSA_MASK;

        let value = if size <= 3 {
            U256::from(word >> (8 * (3 - size)))
        } else {
            let shift = 8 * (size - 3) as usize;
            if shift >= 256 {
                U256::zero()
            } else {
                U256::from(word) << shift
            }
        };

        let negative = word != 0 && (self.0 & SIGN_BIT) != 0;
        let overflow = word != 0
            && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

        DecodedTarget {
            value,
            negative,
            overflow,
        }
    }

    /// Decoded value, flags ignored
    pub fn to_target(self) -> U256 {
        self.decode().value
    }

    /// Minimal compact form of `value`, rounding the mantissa down to three
    /// significant bytes. Never sets the sign bit.
    pub fn encode(value: &U256) -> Self {
        let mut size = ((value.bits() + 7) / 8) as u32;
        let mut mantissa = if size <= 3 {
            (value.low_u64() << (8 * (3 - size))) as u32
        } else {
            (*value >> (8 * (size - 3) as usize)).low_u64() as u32
        };

        // keep the sign bit clear by moving one byte into the exponent
        if mantissa & SIGN_BIT != 0 {
            mantissa >>= 8;
            size += 1;
        }

        CompactTarget((size << 24) | mantissa)
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        CompactTarget(bits)
    }
}

impl From<CompactTarget> for u32 {
    fn from(bits: CompactTarget) -> Self {
        bits.0
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::Debug for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompactTarget")
            .field(&format_args!("{:#010x}", self.0))
            .finish()
    }
}

impl FromStr for CompactTarget {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() > 8 {
            return Err(HexError::TooLong {
                len: s.len(),
                max: 8,
            });
        }
        u32::from_str_radix(s, 16)
            .map(CompactTarget)
            .map_err(|e| HexError::Invalid(e.to_string()))
    }
}
