//! Block production statistics

use serde::{Deserialize, Serialize};

/// Counters kept by the producer loop
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStats {
    /// Polls that reached a decision
    pub cycles: u64,

    /// Polls that decided not to mine (including polls with no tip)
    pub skipped: u64,

    /// Calls into the block generator
    pub attempts: u64,

    /// Blocks the generator reported
    pub blocks_produced: u64,

    /// Generator calls that failed
    pub failures: u64,

    /// Hex hash of the most recent produced block
    pub last_block_hash: Option<String>,
}

impl ProductionStats {
    pub fn record_skip(&mut self) {
        self.cycles += 1;
        self.skipped += 1;
    }

    pub fn record_attempt(&mut self) {
        self.cycles += 1;
        self.attempts += 1;
    }

    pub fn record_blocks(&mut self, hashes: &[String]) {
        self.blocks_produced += hashes.len() as u64;
        if let Some(last) = hashes.last() {
            self.last_block_hash = Some(last.clone());
        }
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Share of generator calls that produced a block
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        (self.attempts - self.failures) as f64 / self.attempts as f64
    }
}
