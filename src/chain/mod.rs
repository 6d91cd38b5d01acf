//! Best-chain storage used by the retarget engine

pub mod accept;
pub mod header;
pub mod index;

pub use accept::accept_header;
pub use header::BlockHeader;
pub use index::{BlockRef, ChainIndex, ChainNode};

use crate::consensus_pow::{CompactTarget, ConsensusParams};
use crate::pow::U256;

/// Genesis header at the primary power limit
pub fn genesis_header(params: &ConsensusParams, time: u32) -> BlockHeader {
    BlockHeader::candidate(U256::zero(), time, CompactTarget::encode(&params.pow_limit))
}
