//! Block producer loop
//!
//! Polls the mempool and the tip age every `poll_interval` and asks the
//! generator for one block when the chain has been quiet long enough.

use super::config::ProductionConfig;
use super::stats::ProductionStats;
use super::{BlockGenerator, ChainTip, Clock, MempoolSignal, ReserveScript, ReserveScriptProvider};
use crate::errors::MiningError;
use crate::pow::{u256_to_hex, U256};
use crate::shutdown::Shutdown;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Mine,
    Skip,
}

/// Mine when the tip is older than the empty-mempool delay, or when work is
/// pending and the tip is older than the populated-mempool delay.
pub fn should_mine(elapsed: u64, pending: bool, cfg: &ProductionConfig) -> Decision {
    if elapsed > cfg.empty_mempool_secs || (pending && elapsed > cfg.populated_mempool_secs) {
        Decision::Mine
    } else {
        Decision::Skip
    }
}

/// Drives block generation from mempool occupancy and tip age
pub struct BlockProducer {
    cfg: ProductionConfig,
    chain: Arc<dyn ChainTip>,
    clock: Arc<dyn Clock>,
    mempool: Arc<dyn MempoolSignal>,
    generator: Arc<dyn BlockGenerator>,
    scripts: Arc<dyn ReserveScriptProvider>,
    shutdown: Shutdown,
    stats: ProductionStats,
}

impl BlockProducer {
    pub fn new(
        cfg: ProductionConfig,
        chain: Arc<dyn ChainTip>,
        clock: Arc<dyn Clock>,
        mempool: Arc<dyn MempoolSignal>,
        generator: Arc<dyn BlockGenerator>,
        scripts: Arc<dyn ReserveScriptProvider>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cfg,
            chain,
            clock,
            mempool,
            generator,
            scripts,
            shutdown,
            stats: ProductionStats::default(),
        }
    }

    /// Run until shutdown is requested; returns the accumulated counters
    pub async fn run(mut self) -> ProductionStats {
        let script = self.scripts.reserve_script();
        let mut shutdown_rx = self.shutdown.subscribe();

        info!(
            empty_mempool_secs = self.cfg.empty_mempool_secs,
            populated_mempool_secs = self.cfg.populated_mempool_secs,
            poll_interval_ms = self.cfg.poll_interval_ms,
            script = %script,
            "block producer started"
        );

        loop {
            let pending = self.mempool.has_pending_work();
            let elapsed = self
                .chain
                .tip_time()
                .map(|tip| self.clock.now().saturating_sub(tip).max(0) as u64);

            debug!(pending, elapsed = ?elapsed, "production cycle");

            if self.shutdown.is_requested() {
                break;
            }

            match elapsed {
                None => {
                    warn!("no chain tip, skipping production cycle");
                    self.stats.record_skip();
                }
                Some(elapsed) => match should_mine(elapsed, pending, &self.cfg) {
                    Decision::Skip => self.stats.record_skip(),
                    Decision::Mine => {
                        self.stats.record_attempt();
                        match self.generate(&script).await {
                            Ok(hashes) => {
                                let hashes: Vec<String> = hashes.iter().map(u256_to_hex).collect();
                                for hash in &hashes {
                                    info!(hash = %hash, elapsed, pending, "block produced");
                                }
                                self.stats.record_blocks(&hashes);
                            }
                            Err(e) => {
                                warn!(error = %e, "block generation failed");
                                self.stats.record_failure();
                            }
                        }
                    }
                },
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cfg.poll_interval()) => {}
                _ = shutdown_rx.recv() => {}
            }
        }

        info!(
            cycles = self.stats.cycles,
            blocks = self.stats.blocks_produced,
            failures = self.stats.failures,
            "block producer stopped"
        );
        self.stats
    }

    async fn generate(&self, script: &ReserveScript) -> Result<Vec<U256>, MiningError> {
        let generator = Arc::clone(&self.generator);
        let script = script.clone();
        let max_tries = self.cfg.max_tries;
        let keep_script = self.cfg.keep_script;

        tokio::task::spawn_blocking(move || {
            generator.generate_blocks(&script, 1, max_tries, keep_script)
        })
        .await
        .map_err(|e| MiningError::TaskFailed(e.to_string()))?
    }
}
