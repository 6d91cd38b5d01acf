//! Header acceptance - single-track validation for every new block
//!
//! All headers (local mining, sync, CLI replay) go through `accept_header`,
//! so the retarget rule and the work check are applied the same way everywhere.

use super::header::BlockHeader;
use super::index::ChainIndex;
use crate::consensus_pow::{next_work_required, verify_proof_of_work, ConsensusParams};
use crate::errors::ChainError;
use crate::pow::{u256_to_hex, U256};
use tracing::debug;

/// Validate `header` against the tip and append it. Returns the block hash.
pub fn accept_header(
    chain: &mut ChainIndex,
    header: BlockHeader,
    params: &ConsensusParams,
) -> Result<U256, ChainError> {
    let height = chain.height().map_or(0, |h| h + 1);

    if let Some(tip) = chain.tip() {
        if header.prev_hash != tip.hash() {
            return Err(ChainError::ParentMismatch { height });
        }
        let expected = next_work_required(Some(tip), &header, params);
        if header.bits != expected {
            return Err(ChainError::BadBits {
                height,
                expected,
                got: header.bits,
            });
        }
    }

    let hash = header.pow_hash();
    verify_proof_of_work(&hash, header.bits, params)?;

    debug!(
        height,
        hash = %u256_to_hex(&hash),
        bits = %header.bits,
        "header accepted"
    );
    chain.push(header)?;
    Ok(hash)
}
