//! Test harness for integration tests.
//!
//! Provides an in-memory chain that can be extended with fixed targets or
//! mined against the retargeting rules, plus tracing setup.

use anyhow::{Context, Result};
use daa_consensus::{
    encode_compact, AnchorCache, BlockId, BlockIndexEntry, BlockTree, ChainIndex, ChainParams,
    ChainParamsConfig, CompactTarget, Network, TargetCalculator,
};
use std::sync::Once;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Genesis timestamp used by fixtures unless one is given.
pub const GENESIS_TIME: u32 = 1_500_000_000;

static TRACING: Once = Once::new();

/// Install a test subscriber once per process. Honors `RUST_LOG`; silent
/// when it is unset.
pub fn init_tracing() {
    TRACING.call_once(|| {
        if std::env::var_os("RUST_LOG").is_none() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory chain with a movable tip.
pub struct TestChain {
    tree: BlockTree,
    params: ChainParams,
    tip: BlockId,
}

impl TestChain {
    /// Chain holding only a genesis block.
    pub fn new(params: ChainParams, genesis_time: u32, genesis_bits: CompactTarget) -> Self {
        init_tracing();
        let mut tree = BlockTree::new();
        let tip = tree.insert_genesis(genesis_time, genesis_bits);
        Self { tree, params, tip }
    }

    /// Chain for a preset network, with genesis mined at the limit.
    pub fn for_network(network: Network) -> Self {
        let params = ChainParams::for_network(network);
        let bits = encode_compact(&params.pow_limit);
        Self::new(params, GENESIS_TIME, bits)
    }

    /// Chain whose parameters come from a TOML document.
    pub fn from_toml(toml: &str, genesis_bits: CompactTarget) -> Result<Self> {
        let config = ChainParamsConfig::from_toml_str(toml).context("parsing chain config")?;
        let params = ChainParams::from_config(&config).context("building chain params")?;
        Ok(Self::new(params, GENESIS_TIME, genesis_bits))
    }

    pub fn tree(&self) -> &BlockTree {
        &self.tree
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn tip(&self) -> BlockId {
        self.tip
    }

    /// Move the tip to any block, e.g. to grow a fork.
    pub fn set_tip(&mut self, id: BlockId) {
        self.tip = id;
    }

    pub fn entry(&self, id: BlockId) -> Result<&BlockIndexEntry> {
        self.tree
            .get(id)
            .with_context(|| format!("{} not in chain", id))
    }

    pub fn tip_entry(&self) -> Result<&BlockIndexEntry> {
        self.entry(self.tip)
    }

    pub fn calculator(&self) -> TargetCalculator<'_, BlockTree> {
        TargetCalculator::new(&self.tree, &self.params)
    }

    /// Timestamp `interval` seconds after `parent`.
    pub fn time_after(&self, parent: BlockId, interval: i64) -> Result<u32> {
        let time = self.entry(parent)?.block_time() + interval;
        u32::try_from(time).with_context(|| format!("timestamp {} out of range", time))
    }

    /// Append a block with the given bits and make it the tip.
    pub fn push(&mut self, interval: i64, bits: CompactTarget) -> Result<BlockId> {
        let time = self.time_after(self.tip, interval)?;
        let id = self.tree.insert(self.tip, time, bits)?;
        self.tip = id;
        Ok(id)
    }

    /// Append `count` blocks with the given bits.
    pub fn push_many(&mut self, count: usize, interval: i64, bits: CompactTarget) -> Result<BlockId> {
        for _ in 0..count {
            self.push(interval, bits)?;
        }
        Ok(self.tip)
    }

    /// Append a block at the target the dispatcher requires.
    pub fn mine(&mut self, interval: i64) -> Result<BlockId> {
        let time = self.time_after(self.tip, interval)?;
        let bits = self
            .calculator()
            .next_required_target(Some(self.tip), i64::from(time))
            .with_context(|| format!("retargeting after {}", self.tip))?;
        let id = self.tree.insert(self.tip, time, bits)?;
        debug!(block = %id, %bits, "Mined test block");
        self.tip = id;
        Ok(id)
    }

    /// Mine one block per interval.
    pub fn mine_intervals<I>(&mut self, intervals: I) -> Result<BlockId>
    where
        I: IntoIterator<Item = i64>,
    {
        for interval in intervals {
            self.mine(interval)?;
        }
        Ok(self.tip)
    }

    /// Append a block at the ASERT target, resolving the anchor through
    /// `cache` when the network has none pinned.
    pub fn mine_asert(&mut self, cache: &AnchorCache, interval: i64) -> Result<BlockId> {
        let time = self.time_after(self.tip, interval)?;
        let bits = self
            .calculator()
            .next_asert_target_cached(cache, self.tip, i64::from(time))
            .with_context(|| format!("ASERT retargeting after {}", self.tip))?;
        let id = self.tree.insert(self.tip, time, bits)?;
        self.tip = id;
        Ok(id)
    }

    /// Blocks from genesis to the tip.
    pub fn main_chain(&self) -> Vec<BlockId> {
        let mut ids = Vec::new();
        let mut cursor = Some(self.tip);
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.tree.get(id).and_then(|entry| entry.prev);
        }
        ids.reverse();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_extends_tip() {
        let mut chain = TestChain::for_network(Network::Regtest);
        let genesis = chain.tip();
        let bits = chain.tip_entry().unwrap().bits;

        let id = chain.push_many(5, 600, bits).unwrap();
        assert_eq!(chain.tip(), id);
        assert_eq!(chain.tip_entry().unwrap().height, 5);
        assert_eq!(
            chain.tip_entry().unwrap().block_time(),
            i64::from(GENESIS_TIME) + 3000
        );

        let ids = chain.main_chain();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[0], genesis);
        assert_eq!(chain.tree().ancestor(id, 2), Some(ids[2]));
    }

    #[test]
    fn test_fork_from_set_tip() {
        let mut chain = TestChain::for_network(Network::Regtest);
        let bits = chain.tip_entry().unwrap().bits;
        let fork_point = chain.push_many(3, 600, bits).unwrap();
        let a = chain.push(600, bits).unwrap();

        chain.set_tip(fork_point);
        let b = chain.push(900, bits).unwrap();
        assert_ne!(a, b);
        assert_eq!(chain.entry(a).unwrap().height, chain.entry(b).unwrap().height);
        assert_eq!(chain.tree().ancestor(b, 3), Some(fork_point));
    }

    #[test]
    fn test_time_out_of_range() {
        let chain = TestChain::new(ChainParams::regtest(), u32::MAX - 10, CompactTarget(0x207fffff));
        assert!(chain.time_after(chain.tip(), 60).is_err());
        assert!(chain.time_after(chain.tip(), 5).is_ok());
    }

    #[test]
    fn test_regtest_mining_keeps_bits() {
        let mut chain = TestChain::for_network(Network::Regtest);
        let bits = chain.tip_entry().unwrap().bits;
        chain.mine_intervals([1, 600, 100_000]).unwrap();
        assert!(chain.main_chain().iter().all(|id| chain.entry(*id).unwrap().bits == bits));
    }
}
