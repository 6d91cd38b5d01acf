//! In-process collaborators for the block producer
//!
//! A shared chain, a placeholder-aware mempool, a nonce-searching generator
//! and simple script/clock providers. Used by `run`, `simulate` and tests.

use super::{BlockGenerator, ChainTip, Clock, MempoolSignal, ReserveScript, ReserveScriptProvider};
use crate::chain::{accept_header, ChainIndex};
use crate::consensus_pow::{BlockBuilder, ConsensusParams};
use crate::errors::MiningError;
use crate::pow::{u256_to_hex, U256};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Best chain shared between the producer and the generator
#[derive(Clone, Default)]
pub struct SharedChain(Arc<RwLock<ChainIndex>>);

impl SharedChain {
    pub fn new(chain: ChainIndex) -> Self {
        Self(Arc::new(RwLock::new(chain)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ChainIndex> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ChainIndex> {
        self.0.write()
    }
}

impl ChainTip for SharedChain {
    fn tip_time(&self) -> Option<i64> {
        self.0.read().tip().map(|tip| tip.time())
    }
}

/// Raw transaction pool. Slot 0 is a housekeeping placeholder that never
/// counts as pending work and is never drained.
pub struct LocalMempool {
    entries: Mutex<VecDeque<Vec<u8>>>,
}

impl LocalMempool {
    pub fn new() -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(Vec::new());
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn submit(&self, tx: Vec<u8>) {
        self.entries.lock().push_back(tx);
    }

    /// Total entries including the placeholder
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> usize {
        self.len().saturating_sub(1)
    }

    /// Copy of up to `max` pending transactions, oldest first
    pub fn snapshot(&self, max: usize) -> Vec<Vec<u8>> {
        self.entries.lock().iter().skip(1).take(max).cloned().collect()
    }

    /// Drop the `count` oldest pending transactions
    pub fn evict(&self, count: usize) {
        let mut entries = self.entries.lock();
        let count = count.min(entries.len().saturating_sub(1));
        entries.drain(1..1 + count);
    }
}

impl Default for LocalMempool {
    fn default() -> Self {
        Self::new()
    }
}

impl MempoolSignal for LocalMempool {
    fn has_pending_work(&self) -> bool {
        self.pending() > 0
    }
}

/// Builds on the shared tip, searches nonces, accepts and drains the mempool
pub struct LocalGenerator {
    chain: SharedChain,
    mempool: Arc<LocalMempool>,
    clock: Arc<dyn Clock>,
    builder: BlockBuilder,
    max_block_txs: usize,
}

impl LocalGenerator {
    pub fn new(
        chain: SharedChain,
        mempool: Arc<LocalMempool>,
        clock: Arc<dyn Clock>,
        params: ConsensusParams,
    ) -> Self {
        Self {
            chain,
            mempool,
            clock,
            builder: BlockBuilder::new(params),
            max_block_txs: 1000,
        }
    }

    pub fn with_max_block_txs(mut self, max: usize) -> Self {
        self.max_block_txs = max;
        self
    }

    fn generate_one(&self, script: &ReserveScript, max_tries: u64) -> Result<U256, MiningError> {
        let txs = self.mempool.snapshot(self.max_block_txs);
        let payload: Vec<&[u8]> = txs.iter().map(Vec::as_slice).collect();

        let mut header = {
            let chain = self.chain.read();
            self.builder
                .build_candidate(&chain, self.clock.now(), script.as_bytes(), &payload)?
        };

        // nonce search runs without holding the chain lock
        self.builder.solve(&mut header, max_tries)?;

        let bits = header.bits;
        let hash = {
            let mut chain = self.chain.write();
            let hash = accept_header(&mut chain, header, self.builder.params())?;
            info!(
                height = chain.height().unwrap_or_default(),
                hash = %u256_to_hex(&hash),
                bits = %bits,
                txs = txs.len(),
                "local block accepted"
            );
            hash
        };

        self.mempool.evict(txs.len());
        Ok(hash)
    }
}

impl BlockGenerator for LocalGenerator {
    fn generate_blocks(
        &self,
        script: &ReserveScript,
        count: u32,
        max_tries: u64,
        keep_script: bool,
    ) -> Result<Vec<U256>, MiningError> {
        debug!(count, max_tries, keep_script, "generating blocks");
        let mut hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            hashes.push(self.generate_one(script, max_tries)?);
        }
        Ok(hashes)
    }
}

/// Always hands out the same payout script
#[derive(Clone, Debug)]
pub struct StaticScript(pub ReserveScript);

impl ReserveScriptProvider for StaticScript {
    fn reserve_script(&self) -> ReserveScript {
        self.0.clone()
    }
}

/// Settable clock for simulations and tests
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::genesis_header;
    use crate::consensus_pow::NetworkKind;

    fn regtest_chain(genesis_time: u32) -> (SharedChain, ConsensusParams) {
        let params = NetworkKind::Regtest.params();
        let genesis = genesis_header(&params, genesis_time);
        (SharedChain::new(ChainIndex::with_genesis(genesis)), params)
    }

    #[test]
    fn test_placeholder_is_not_pending() {
        let pool = LocalMempool::new();
        assert_eq!(pool.len(), 1);
        assert!(!pool.has_pending_work());

        pool.submit(b"tx1".to_vec());
        pool.submit(b"tx2".to_vec());
        assert_eq!(pool.pending(), 2);
        assert!(pool.has_pending_work());
        assert_eq!(pool.snapshot(1), vec![b"tx1".to_vec()]);

        pool.evict(5);
        assert_eq!(pool.len(), 1);
        assert!(!pool.has_pending_work());
    }

    #[test]
    fn test_shared_chain_tip_time() {
        assert_eq!(SharedChain::default().tip_time(), None);
        let (chain, _) = regtest_chain(1_700_000_000);
        assert_eq!(chain.tip_time(), Some(1_700_000_000));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        clock.advance(20);
        assert_eq!(clock.now(), 120);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_local_generator_extends_chain_and_drains_pool() {
        let (chain, params) = regtest_chain(1_700_000_000);
        let pool = Arc::new(LocalMempool::new());
        pool.submit(b"payment".to_vec());
        let clock = Arc::new(ManualClock::new(1_700_000_100));

        let generator = LocalGenerator::new(chain.clone(), pool.clone(), clock, params);
        let script = ReserveScript(vec![0x51]);
        let hashes = generator.generate_blocks(&script, 2, 1_000_000, true).unwrap();

        assert_eq!(hashes.len(), 2);
        let index = chain.read();
        assert_eq!(index.height(), Some(2));
        assert_eq!(index.tip().unwrap().hash(), hashes[1]);
        // second block is forced one second past the first
        assert_eq!(index.tip().unwrap().time(), 1_700_000_101);
        assert!(!pool.has_pending_work());
    }

    #[test]
    fn test_local_generator_without_tip() {
        let pool = Arc::new(LocalMempool::new());
        let generator = LocalGenerator::new(
            SharedChain::default(),
            pool,
            Arc::new(ManualClock::new(0)),
            NetworkKind::Regtest.params(),
        );
        let err = generator
            .generate_blocks(&ReserveScript::default(), 1, 10, true)
            .unwrap_err();
        assert_eq!(err, MiningError::NoTip);
    }
}
