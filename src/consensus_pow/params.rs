//! Canonical consensus parameters for retargeting
//!
//! This is the single source of truth for difficulty parameters.
//! All miners and validators MUST use these exact params or the chain will fork.

use crate::errors::ConfigError;
use crate::pow::{u256_from_hex, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which power limit a rule refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// `pow_limit`, the normal easiest target
    Primary,
    /// `pow_limit_relaxed`, used while min-difficulty blocks are allowed
    Relaxed,
}

/// Network-wide difficulty constants. Loaded once, read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusParams {
    /// Maximum (easiest) target
    pub pow_limit: U256,
    /// Relaxed maximum used under the min-difficulty regime
    pub pow_limit_relaxed: U256,
    /// Seconds between blocks
    pub target_spacing: i64,
    /// Blocks of history required before DarkGravityWave kicks in
    pub averaging_interval: u32,
    /// Testnet-like relaxed mode (selects LWMA3 and the relaxed limit)
    pub allow_min_difficulty_blocks: bool,
}

impl ConsensusParams {
    pub fn limit(&self, which: Limit) -> &U256 {
        match which {
            Limit::Primary => &self.pow_limit,
            Limit::Relaxed => &self.pow_limit_relaxed,
        }
    }

    /// The limit block hashes are checked against for this network mode
    pub fn active_limit(&self) -> &U256 {
        if self.allow_min_difficulty_blocks {
            &self.pow_limit_relaxed
        } else {
            &self.pow_limit
        }
    }

    /// Reject parameter sets the retarget arithmetic cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_spacing <= 0 {
            return Err(ConfigError::InvalidParam(format!(
                "target_spacing must be positive, got {}",
                self.target_spacing
            )));
        }
        if self.target_spacing > MAX_TARGET_SPACING {
            return Err(ConfigError::InvalidParam(format!(
                "target_spacing must be at most {}, got {}",
                MAX_TARGET_SPACING, self.target_spacing
            )));
        }
        if self.averaging_interval == 0 {
            return Err(ConfigError::InvalidParam(
                "averaging_interval must be at least 1".into(),
            ));
        }
        if self.pow_limit.is_zero() || self.pow_limit_relaxed.is_zero() {
            return Err(ConfigError::InvalidParam("power limits must be non-zero".into()));
        }
        Ok(())
    }
}

/// Largest accepted block spacing; header times are 32-bit seconds
pub const MAX_TARGET_SPACING: i64 = u32::MAX as i64;

/// Known networks with preset parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Mainnet,
    Testnet,
    Regtest,
}

impl NetworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKind::Mainnet => "mainnet",
            NetworkKind::Testnet => "testnet",
            NetworkKind::Regtest => "regtest",
        }
    }

    /// Preset parameters for this network
    pub fn params(&self) -> ConsensusParams {
        match self {
            NetworkKind::Mainnet => ConsensusParams {
                pow_limit: limit_from_hex(MAINNET_POW_LIMIT),
                pow_limit_relaxed: limit_from_hex(MAINNET_POW_LIMIT),
                target_spacing: 120,
                averaging_interval: 24,
                allow_min_difficulty_blocks: false,
            },
            NetworkKind::Testnet => ConsensusParams {
                pow_limit: limit_from_hex(MAINNET_POW_LIMIT),
                pow_limit_relaxed: limit_from_hex(TESTNET_POW_LIMIT_RELAXED),
                target_spacing: 120,
                averaging_interval: 24,
                allow_min_difficulty_blocks: true,
            },
            NetworkKind::Regtest => ConsensusParams {
                pow_limit: limit_from_hex(REGTEST_POW_LIMIT),
                pow_limit_relaxed: limit_from_hex(REGTEST_POW_LIMIT),
                target_spacing: 10,
                averaging_interval: 24,
                allow_min_difficulty_blocks: true,
            },
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(NetworkKind::Mainnet),
            "testnet" | "test" => Ok(NetworkKind::Testnet),
            "regtest" => Ok(NetworkKind::Regtest),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

const MAINNET_POW_LIMIT: &str = "00000fffff000000000000000000000000000000000000000000000000000000";
const TESTNET_POW_LIMIT_RELAXED: &str =
    "000fffff00000000000000000000000000000000000000000000000000000000";
const REGTEST_POW_LIMIT: &str = "7fffff0000000000000000000000000000000000000000000000000000000000";

// presets are compile-time literals; a parse failure would be a typo above
fn limit_from_hex(s: &str) -> U256 {
    u256_from_hex(s).unwrap_or(U256::MAX)
}
