//! Domain-specific error types for the retarget node
//!
//! Consensus functions never return these; they are total and fall back to the
//! power limit. Errors only surface from the ambient layers (config, chain
//! bookkeeping, block generation, parsing).

use crate::consensus_pow::CompactTarget;
use thiserror::Error;

/// Reasons a claimed proof of work is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowError {
    #[error("compact target has the sign bit set")]
    NegativeTarget,

    #[error("compact target overflows 256 bits")]
    OverflowTarget,

    #[error("compact target decodes to zero")]
    ZeroTarget,

    #[error("target is easier than the network power limit")]
    AboveLimit,

    #[error("block hash does not meet the claimed target")]
    HashAboveTarget,
}

/// Chain bookkeeping errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("header at height {height} does not extend the current tip")]
    ParentMismatch { height: u64 },

    #[error("header at height {height} claims bits {got}, expected {expected}")]
    BadBits {
        height: u64,
        expected: CompactTarget,
        got: CompactTarget,
    },

    #[error("invalid proof of work: {0}")]
    InvalidPow(#[from] PowError),
}

/// Hex parsing errors for targets and compact bits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Invalid(String),

    #[error("value too long: {len} hex digits (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("invalid hex for {field}: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: HexError,
    },

    #[error("invalid consensus parameter: {0}")]
    InvalidParam(String),
}

/// Block generation errors reported by a `BlockGenerator`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("no chain tip to build on")]
    NoTip,

    #[error("nonce search exhausted after {tries} tries")]
    Exhausted { tries: u64 },

    #[error("block time {time} does not fit a 32-bit header timestamp")]
    TimeOutOfRange { time: i64 },

    #[error("block rejected: {0}")]
    Rejected(String),

    #[error("generation task failed: {0}")]
    TaskFailed(String),
}

impl From<ChainError> for MiningError {
    fn from(e: ChainError) -> Self {
        MiningError::Rejected(e.to_string())
    }
}

impl From<PowError> for MiningError {
    fn from(e: PowError) -> Self {
        MiningError::Rejected(e.to_string())
    }
}
