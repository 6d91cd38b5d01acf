//! Candidate block assembly and nonce search
//!
//! Builds a header on top of the current tip with the retarget engine's
//! required bits, then searches nonces until the hash meets that target or
//! the try budget runs out.

use super::difficulty::next_work_required;
use super::params::ConsensusParams;
use super::validate::check_proof_of_work;
use crate::chain::{BlockHeader, ChainIndex};
use crate::errors::MiningError;
use crate::pow::{u256_from_le_bytes, U256};

/// Merkle root over raw leaves (coinbase script first)
pub fn calculate_merkle_root(leaves: &[&[u8]]) -> U256 {
    if leaves.is_empty() {
        return U256::zero();
    }

    let mut hashes: Vec<[u8; 32]> = leaves.iter().map(|leaf| blake3::hash(leaf).into()).collect();

    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity(hashes.len().div_ceil(2));

        for chunk in hashes.chunks(2) {
            let mut data = Vec::with_capacity(64);
            data.extend_from_slice(&chunk[0]);
            if chunk.len() > 1 {
                data.extend_from_slice(&chunk[1]);
            } else {
                data.extend_from_slice(&chunk[0]); // Duplicate last hash if odd
            }
            next_level.push(blake3::hash(&data).into());
        }

        hashes = next_level;
    }

    u256_from_le_bytes(&hashes[0])
}

/// Assembles and solves candidate headers for one network
pub struct BlockBuilder {
    params: ConsensusParams,
}

impl BlockBuilder {
    pub fn new(params: ConsensusParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Header extending the tip, timestamped no earlier than `tip.time + 1`.
    /// Fails when that time does not fit the 32-bit header field.
    pub fn build_candidate(
        &self,
        chain: &ChainIndex,
        now: i64,
        coinbase_script: &[u8],
        payload: &[&[u8]],
    ) -> Result<BlockHeader, MiningError> {
        let tip = chain.tip().ok_or(MiningError::NoTip)?;

        let mut leaves: Vec<&[u8]> = Vec::with_capacity(payload.len() + 1);
        leaves.push(coinbase_script);
        leaves.extend_from_slice(payload);

        let time = now.max(tip.time() + 1);
        let time = u32::try_from(time).map_err(|_| MiningError::TimeOutOfRange { time })?;
        let mut header = BlockHeader::candidate(tip.hash(), time, Default::default());
        header.merkle_root = calculate_merkle_root(&leaves);
        header.bits = next_work_required(Some(tip), &header, &self.params);
        Ok(header)
    }

    /// Search nonces from zero; returns the winning hash with `header.nonce` set
    pub fn solve(&self, header: &mut BlockHeader, max_tries: u64) -> Result<U256, MiningError> {
        let tries = max_tries.min(u64::from(u32::MAX) + 1);
        for nonce in 0..tries {
            header.nonce = nonce as u32;
            let hash = header.pow_hash();
            if check_proof_of_work(&hash, header.bits, &self.params) {
                return Ok(hash);
            }
        }
        Err(MiningError::Exhausted { tries })
    }
}
