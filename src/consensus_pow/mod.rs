//! Consensus PoW module
//!
//! Compact target encoding, difficulty retargeting (DarkGravityWave / LWMA3),
//! proof-of-work validation and candidate block assembly.

pub mod block_builder;
pub mod compact;
pub mod difficulty;
pub mod params;
pub mod validate;

pub use block_builder::BlockBuilder;
pub use compact::{CompactTarget, DecodedTarget};
pub use difficulty::{
    dark_gravity_wave, lwma3, next_work_required, target_to_difficulty, RetargetAlgorithm,
};
pub use params::{ConsensusParams, Limit, NetworkKind};
pub use validate::{check_proof_of_work, verify_proof_of_work};
