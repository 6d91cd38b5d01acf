//! Block production
//!
//! `BlockProducer` polls mempool occupancy and the age of the chain tip and
//! asks an external `BlockGenerator` for a block when either the chain has
//! been quiet too long or there is pending work and a shorter delay passed.
//! Everything it touches outside itself is behind the traits below.

pub mod config;
pub mod local;
pub mod manager;
pub mod stats;

pub use config::ProductionConfig;
pub use manager::{should_mine, BlockProducer, Decision};
pub use stats::ProductionStats;

use crate::errors::{HexError, MiningError};
use crate::pow::U256;
use std::fmt;

/// Coinbase payout destination reserved for mined blocks
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReserveScript(pub Vec<u8>);

impl ReserveScript {
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s)
            .map(ReserveScript)
            .map_err(|e| HexError::Invalid(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ReserveScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Timestamp of the current best tip
pub trait ChainTip: Send + Sync {
    fn tip_time(&self) -> Option<i64>;
}

/// Network-adjusted wall clock, unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Whether the mempool holds transactions beyond its placeholder entry
pub trait MempoolSignal: Send + Sync {
    fn has_pending_work(&self) -> bool;
}

/// Assembles, solves and publishes blocks. Does its own locking.
pub trait BlockGenerator: Send + Sync + 'static {
    fn generate_blocks(
        &self,
        script: &ReserveScript,
        count: u32,
        max_tries: u64,
        keep_script: bool,
    ) -> Result<Vec<U256>, MiningError>;
}

pub trait ReserveScriptProvider: Send + Sync {
    fn reserve_script(&self) -> ReserveScript;
}

/// System clock via chrono
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
