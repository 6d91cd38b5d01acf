//! Proof-of-work check for a claimed compact target

use super::compact::CompactTarget;
use super::params::ConsensusParams;
use crate::errors::PowError;
use crate::pow::U256;

/// Check `hash` against `bits`, naming the first rule that fails
pub fn verify_proof_of_work(
    hash: &U256,
    bits: CompactTarget,
    params: &ConsensusParams,
) -> Result<(), PowError> {
    let decoded = bits.decode();

    if decoded.negative {
        return Err(PowError::NegativeTarget);
    }
    if decoded.overflow {
        return Err(PowError::OverflowTarget);
    }
    if decoded.value.is_zero() {
        return Err(PowError::ZeroTarget);
    }
    if decoded.value > *params.active_limit() {
        return Err(PowError::AboveLimit);
    }

    if *hash > decoded.value {
        return Err(PowError::HashAboveTarget);
    }
    Ok(())
}

/// True when `hash` satisfies the claimed target under this network's limit
pub fn check_proof_of_work(hash: &U256, bits: CompactTarget, params: &ConsensusParams) -> bool {
    verify_proof_of_work(hash, bits, params).is_ok()
}
