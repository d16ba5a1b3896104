//! In-memory block arena.

use super::{skip_height, BlockId, BlockIndexEntry, ChainIndex};
use crate::compact::{block_proof, CompactTarget};
use crate::ConsensusResult;
use num_bigint::BigUint;

/// Append-only arena of block index entries.
///
/// Entries are never removed, so handles stay valid for the life of the
/// tree. Any number of branches may share ancestors.
#[derive(Debug, Default, Clone)]
pub struct BlockTree {
    entries: Vec<BlockIndexEntry>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a genesis block. Its chain work is its own block proof.
    pub fn insert_genesis(&mut self, time: u32, bits: CompactTarget) -> BlockId {
        self.push(BlockIndexEntry {
            height: 0,
            time,
            bits,
            chain_work: block_proof(bits),
            prev: None,
            skip: None,
        })
    }

    /// Add a parentless block at an arbitrary height.
    ///
    /// Used to load a chain suffix without its full history, such as a
    /// checkpointed tip.
    pub fn insert_root(
        &mut self,
        height: u32,
        time: u32,
        bits: CompactTarget,
        chain_work: BigUint,
    ) -> BlockId {
        self.push(BlockIndexEntry {
            height,
            time,
            bits,
            chain_work,
            prev: None,
            skip: None,
        })
    }

    /// Extend `prev` with a new block.
    pub fn insert(
        &mut self,
        prev: BlockId,
        time: u32,
        bits: CompactTarget,
    ) -> ConsensusResult<BlockId> {
        let parent = self.entry(prev)?;
        let height = parent.height + 1;
        let chain_work = &parent.chain_work + block_proof(bits);
        let skip = self.ancestor(prev, skip_height(height));

        Ok(self.push(BlockIndexEntry {
            height,
            time,
            bits,
            chain_work,
            prev: Some(prev),
            skip,
        }))
    }

    /// Iterate over all entries with their handles, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BlockIndexEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (BlockId(i as u32), entry))
    }

    fn push(&mut self, entry: BlockIndexEntry) -> BlockId {
        let id = BlockId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }
}

impl ChainIndex for BlockTree {
    fn get(&self, id: BlockId) -> Option<&BlockIndexEntry> {
        self.entries.get(id.index())
    }
}
