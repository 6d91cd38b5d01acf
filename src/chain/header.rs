//! Block header and its proof-of-work hash

use crate::consensus_pow::CompactTarget;
use crate::pow::{u256_from_le_bytes, u256_to_le_bytes, U256};

/// Serialized header length: version + prev + merkle + time + bits + nonce
pub const HEADER_LEN: usize = 4 + 32 + 32 + 4 + 4 + 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: U256,
    pub merkle_root: U256,
    /// Unix seconds, 32-bit as on the wire
    pub time: u32,
    /// Claimed target
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl BlockHeader {
    /// Candidate header on top of `prev_hash`, nonce zeroed
    pub fn candidate(prev_hash: U256, time: u32, bits: CompactTarget) -> Self {
        Self {
            version: 1,
            prev_hash,
            merkle_root: U256::zero(),
            time,
            bits,
            nonce: 0,
        }
    }

    /// Fixed little-endian wire layout; this is what gets hashed
    pub fn serialize(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&u256_to_le_bytes(&self.prev_hash));
        out[36..68].copy_from_slice(&u256_to_le_bytes(&self.merkle_root));
        out[68..72].copy_from_slice(&self.time.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_u32().to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// BLAKE3 of the serialized header, read as a little-endian integer
    pub fn pow_hash(&self) -> U256 {
        let digest = blake3::hash(&self.serialize());
        u256_from_le_bytes(digest.as_bytes())
    }
}
