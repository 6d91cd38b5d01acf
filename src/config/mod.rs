//! Node configuration
//!
//! Loaded from an optional TOML file, then overridden from `RETARGET_*`
//! environment variables.

pub mod network;

pub use network::ConsensusOverrides;

use crate::consensus_pow::{ConsensusParams, NetworkKind};
use crate::errors::ConfigError;
use crate::miner::ProductionConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkKind,
    pub consensus: ConsensusOverrides,
    pub production: ProductionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkKind::Mainnet,
            consensus: ConsensusOverrides::default(),
            production: ProductionConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Read `path` if given (defaults otherwise), then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply RETARGET_* environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // RETARGET_NETWORK
        if let Ok(val) = env::var("RETARGET_NETWORK") {
            self.network = val.trim().parse()?;
        }

        self.production.apply_env();
        Ok(())
    }

    /// Network preset with `[consensus]` overrides applied
    pub fn consensus_params(&self) -> Result<ConsensusParams, ConfigError> {
        self.consensus.resolve(self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_mainnet() {
        let config = NodeConfig::default();
        assert_eq!(config.network, NetworkKind::Mainnet);
        assert_eq!(config.consensus_params().unwrap(), NetworkKind::Mainnet.params());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
network = "testnet"

[consensus]
target_spacing = 60

[production]
empty_mempool_secs = 45
coinbase_script = "76a914"
"#
        )
        .unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.network, NetworkKind::Testnet);
        assert_eq!(config.production.empty_mempool_secs, 45);
        assert_eq!(config.production.populated_mempool_secs, 15);
        assert_eq!(config.production.coinbase_script, "76a914");

        let params = config.consensus_params().unwrap();
        assert_eq!(params.target_spacing, 60);
        assert!(params.allow_min_difficulty_blocks);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(
            NodeConfig::from_toml("network = 7"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            NodeConfig::from_toml("network = \"devnet\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
