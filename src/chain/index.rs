//! Height-indexed block index for the best chain
//!
//! The index owns every node. A node's link to its predecessor is an arena
//! slot, never an owning pointer, and `BlockRef` is a borrowed `Copy` handle
//! used for navigation by the retarget code.

use super::header::BlockHeader;
use crate::consensus_pow::CompactTarget;
use crate::errors::ChainError;
use crate::pow::U256;

/// One block's position in the best chain
#[derive(Clone, Debug)]
pub struct ChainNode {
    pub height: u64,
    pub header: BlockHeader,
    pub hash: U256,
    /// Arena slot of the predecessor (`None` for genesis)
    pub prev: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct ChainIndex {
    nodes: Vec<ChainNode>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_genesis(genesis: BlockHeader) -> Self {
        let mut chain = Self::new();
        chain.push_node(genesis);
        chain
    }

    /// Build a linked chain from `(time, bits)` pairs, genesis first.
    /// Headers get real parent hashes so the result passes `push` checks.
    pub fn from_timeline<I>(timeline: I) -> Self
    where
        I: IntoIterator<Item = (u32, CompactTarget)>,
    {
        let mut chain = Self::new();
        for (time, bits) in timeline {
            let prev_hash = chain.tip().map(|t| t.hash()).unwrap_or_else(U256::zero);
            chain.push_node(BlockHeader::candidate(prev_hash, time, bits));
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the tip
    pub fn height(&self) -> Option<u64> {
        self.tip().map(|t| t.height())
    }

    pub fn tip(&self) -> Option<BlockRef<'_>> {
        self.nodes
            .len()
            .checked_sub(1)
            .map(|idx| BlockRef { chain: self, idx })
    }

    pub fn at(&self, height: u64) -> Option<BlockRef<'_>> {
        let idx = usize::try_from(height).ok()?;
        if idx < self.nodes.len() {
            Some(BlockRef { chain: self, idx })
        } else {
            None
        }
    }

    /// Append a header that extends the tip
    pub fn push(&mut self, header: BlockHeader) -> Result<BlockRef<'_>, ChainError> {
        if let Some(tip) = self.tip() {
            if header.prev_hash != tip.hash() {
                return Err(ChainError::ParentMismatch {
                    height: tip.height() + 1,
                });
            }
        }
        let idx = self.push_node(header);
        Ok(BlockRef { chain: self, idx })
    }

    fn push_node(&mut self, header: BlockHeader) -> usize {
        let idx = self.nodes.len();
        let hash = header.pow_hash();
        self.nodes.push(ChainNode {
            height: idx as u64,
            header,
            hash,
            prev: idx.checked_sub(1),
        });
        idx
    }
}

/// Borrowed view of one node plus the index it lives in
#[derive(Clone, Copy)]
pub struct BlockRef<'a> {
    chain: &'a ChainIndex,
    idx: usize,
}

impl<'a> BlockRef<'a> {
    fn node(&self) -> &'a ChainNode {
        &self.chain.nodes[self.idx]
    }

    pub fn height(&self) -> u64 {
        self.node().height
    }

    /// Header time widened for signed interval arithmetic
    pub fn time(&self) -> i64 {
        i64::from(self.node().header.time)
    }

    pub fn bits(&self) -> CompactTarget {
        self.node().header.bits
    }

    pub fn hash(&self) -> U256 {
        self.node().hash
    }

    pub fn header(&self) -> &'a BlockHeader {
        &self.node().header
    }

    pub fn prev(&self) -> Option<BlockRef<'a>> {
        self.node().prev.map(|idx| BlockRef {
            chain: self.chain,
            idx,
        })
    }

    /// Node at `height` on the path to this one
    pub fn ancestor(&self, height: u64) -> Option<BlockRef<'a>> {
        if height > self.height() {
            return None;
        }
        self.chain.at(height)
    }
}

impl std::fmt::Debug for BlockRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRef")
            .field("height", &self.height())
            .field("time", &self.time())
            .field("bits", &self.bits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(n: usize) -> ChainIndex {
        ChainIndex::from_timeline((0..n as u32).map(|i| (1000 + i * 60, CompactTarget(0x1e0fffff))))
    }

    #[test]
    fn test_empty_chain() {
        let chain = ChainIndex::new();
        assert!(chain.is_empty());
        assert!(chain.tip().is_none());
        assert!(chain.height().is_none());
        assert!(chain.at(0).is_none());
    }

    #[test]
    fn test_navigation() {
        let chain = timeline(10);
        let tip = chain.tip().unwrap();
        assert_eq!(tip.height(), 9);
        assert_eq!(tip.time(), 1000 + 9 * 60);

        let prev = tip.prev().unwrap();
        assert_eq!(prev.height(), 8);
        assert_eq!(prev.hash(), tip.header().prev_hash);

        assert_eq!(tip.ancestor(3).unwrap().height(), 3);
        assert_eq!(tip.ancestor(9).unwrap().height(), 9);
        assert!(tip.ancestor(10).is_none());

        // ancestor never looks past the node itself
        let mid = chain.at(4).unwrap();
        assert!(mid.ancestor(5).is_none());
    }

    #[test]
    fn test_walk_stops_at_genesis() {
        let chain = timeline(3);
        let genesis = chain.tip().unwrap().prev().unwrap().prev().unwrap();
        assert_eq!(genesis.height(), 0);
        assert!(genesis.prev().is_none());
    }

    #[test]
    fn test_push_checks_parent() {
        let mut chain = timeline(2);
        let tip_hash = chain.tip().unwrap().hash();

        let bad = BlockHeader::candidate(U256::from(7u64), 2000, CompactTarget(0x1e0fffff));
        assert!(matches!(
            chain.push(bad),
            Err(ChainError::ParentMismatch { height: 2 })
        ));

        let good = BlockHeader::candidate(tip_hash, 2000, CompactTarget(0x1e0fffff));
        let added = chain.push(good).unwrap();
        assert_eq!(added.height(), 2);
        assert_eq!(chain.len(), 3);
    }
}
