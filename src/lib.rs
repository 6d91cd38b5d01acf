//! Proof-of-work retargeting engine and block producer
//!
//! Compact target codec, DarkGravityWave v3 and LWMA3 retargeting over a
//! height-indexed best chain, proof-of-work validation, and a polling block
//! producer that mines on stale tips or pending mempool work.

pub mod chain;
pub mod config;
pub mod consensus_pow;
pub mod errors;
pub mod miner;
pub mod pow;
pub mod shutdown;

pub use chain::{BlockHeader, BlockRef, ChainIndex};
pub use consensus_pow::{
    check_proof_of_work, next_work_required, CompactTarget, ConsensusParams, NetworkKind,
    RetargetAlgorithm,
};
pub use pow::U256;
