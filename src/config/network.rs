//! Network selection and consensus parameter overrides

use crate::consensus_pow::{ConsensusParams, NetworkKind};
use crate::errors::ConfigError;
use crate::pow::u256_from_hex;
use serde::{Deserialize, Serialize};

/// Optional `[consensus]` table. Any field left out keeps the network preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusOverrides {
    /// Hex, big-endian
    pub pow_limit: Option<String>,
    /// Hex, big-endian
    pub pow_limit_relaxed: Option<String>,
    pub target_spacing: Option<i64>,
    pub averaging_interval: Option<u32>,
    pub allow_min_difficulty_blocks: Option<bool>,
}

impl ConsensusOverrides {
    /// Preset params for `network` with these overrides applied, validated
    pub fn resolve(&self, network: NetworkKind) -> Result<ConsensusParams, ConfigError> {
        let mut params = network.params();

        if let Some(hex) = &self.pow_limit {
            params.pow_limit = u256_from_hex(hex).map_err(|source| ConfigError::InvalidHex {
                field: "pow_limit",
                source,
            })?;
        }

        if let Some(hex) = &self.pow_limit_relaxed {
            params.pow_limit_relaxed =
                u256_from_hex(hex).map_err(|source| ConfigError::InvalidHex {
                    field: "pow_limit_relaxed",
                    source,
                })?;
        }

        if let Some(spacing) = self.target_spacing {
            params.target_spacing = spacing;
        }

        if let Some(interval) = self.averaging_interval {
            params.averaging_interval = interval;
        }

        if let Some(allow) = self.allow_min_difficulty_blocks {
            params.allow_min_difficulty_blocks = allow;
        }

        params.validate()?;
        Ok(params)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
