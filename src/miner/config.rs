//! Block production configuration
//!
//! Delays, poll interval and generation budget for the producer loop.
//! Defaults match the historical node behaviour (90s / 15s / 3000ms).

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Producer loop settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Produce a block after this many quiet seconds even with an empty mempool
    pub empty_mempool_secs: u64,

    /// Produce a block after this many seconds when transactions are pending
    pub populated_mempool_secs: u64,

    /// Sleep between polls
    pub poll_interval_ms: u64,

    /// Nonce attempts handed to the generator per block
    pub max_tries: u64,

    /// Keep the reserved payout script after a successful block
    pub keep_script: bool,

    /// Payout script as hex
    pub coinbase_script: String,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            empty_mempool_secs: 90,
            populated_mempool_secs: 15,
            poll_interval_ms: 3000,
            max_tries: 0xff_ffff,
            keep_script: true,
            coinbase_script: "51".to_string(), // OP_TRUE
        }
    }
}

impl ProductionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Apply RETARGET_* environment overrides
    pub fn apply_env(&mut self) {
        // RETARGET_EMPTY_MEMPOOL_SECS
        if let Some(num) = env_u64("RETARGET_EMPTY_MEMPOOL_SECS") {
            self.empty_mempool_secs = num;
        }

        // RETARGET_POPULATED_MEMPOOL_SECS
        if let Some(num) = env_u64("RETARGET_POPULATED_MEMPOOL_SECS") {
            self.populated_mempool_secs = num;
        }

        // RETARGET_POLL_INTERVAL_MS
        if let Some(num) = env_u64("RETARGET_POLL_INTERVAL_MS") {
            self.poll_interval_ms = num;
        }

        // RETARGET_MAX_TRIES
        if let Some(num) = env_u64("RETARGET_MAX_TRIES") {
            self.max_tries = num;
        }

        // RETARGET_COINBASE_SCRIPT
        if let Ok(val) = env::var("RETARGET_COINBASE_SCRIPT") {
            self.coinbase_script = val.trim().to_string();
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}
