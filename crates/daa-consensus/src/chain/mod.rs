//! Block index: the chain state that target computation reads.
//!
//! Blocks live in an arena owned by the index and refer to each other through
//! [`BlockId`] handles. Retargeting code only borrows the index for the
//! duration of a call.

mod skip;
mod tree;

pub use skip::{invert_lowest_one, skip_height};
pub use tree::BlockTree;

use crate::chain_params::ChainParams;
use crate::compact::{block_proof, low_u64, CompactTarget};
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use num_traits::Zero;
use std::fmt;

/// Number of blocks considered for median-time-past.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Stable handle to a block in a chain index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Arena slot.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// Metadata of one validated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndexEntry {
    /// Height above genesis.
    pub height: u32,
    /// Header timestamp (seconds).
    pub time: u32,
    /// Compact target the block was mined against.
    pub bits: CompactTarget,
    /// Cumulative work from genesis through this block.
    pub chain_work: BigUint,
    /// Immediate predecessor; `None` only for a root.
    pub prev: Option<BlockId>,
    /// Skip-list ancestor at `skip_height(height)`.
    pub skip: Option<BlockId>,
}

impl BlockIndexEntry {
    /// Header timestamp widened for signed arithmetic.
    pub fn block_time(&self) -> i64 {
        i64::from(self.time)
    }
}

/// Read-only queries over an index of validated blocks.
///
/// Only `get` is required; the remaining queries follow `prev` and `skip`
/// links and work for any arena that keeps those links consistent.
pub trait ChainIndex {
    /// Look up a block by handle.
    fn get(&self, id: BlockId) -> Option<&BlockIndexEntry>;

    /// Look up a block, failing on an unknown handle.
    fn entry(&self, id: BlockId) -> ConsensusResult<&BlockIndexEntry> {
        self.get(id).ok_or(ConsensusError::UnknownBlock(id))
    }

    /// Ancestor of `id` at `height`, or `None` if out of range.
    ///
    /// Follows skip links where they don't overshoot, so the walk takes
    /// O(log n) hops.
    fn ancestor(&self, id: BlockId, height: u32) -> Option<BlockId> {
        let mut walk_id = id;
        let mut walk = self.get(id)?;
        if height > walk.height {
            return None;
        }

        while walk.height > height {
            let walk_height = walk.height;
            let height_skip = skip_height(walk_height);
            let height_skip_prev = i64::from(skip_height(walk_height - 1));
            let skip_target = walk.skip.and_then(|skip| self.get(skip).map(|e| (skip, e)));

            let take_skip = height_skip == height
                || (height_skip > height
                    && !(height_skip_prev < i64::from(height_skip) - 2
                        && height_skip_prev >= i64::from(height)));

            match skip_target {
                Some((skip, entry)) if take_skip => {
                    walk_id = skip;
                    walk = entry;
                }
                _ => {
                    walk_id = walk.prev?;
                    walk = self.get(walk_id)?;
                }
            }
        }

        Some(walk_id)
    }

    /// Median timestamp of `id` and up to ten of its ancestors.
    fn median_time_past(&self, id: BlockId) -> ConsensusResult<i64> {
        let mut times = Vec::with_capacity(MEDIAN_TIME_SPAN);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if times.len() == MEDIAN_TIME_SPAN {
                break;
            }
            let entry = self.entry(current)?;
            times.push(entry.block_time());
            cursor = entry.prev;
        }
        times.sort_unstable();
        Ok(times[times.len() / 2])
    }

    /// Cumulative work through `id`.
    fn chain_work(&self, id: BlockId) -> ConsensusResult<&BigUint> {
        self.entry(id).map(|entry| &entry.chain_work)
    }
}

/// Work between `from` and `to`, expressed in seconds at the tip's work rate.
///
/// Positive when `to` carries more work. Saturates at `i64::MAX` in
/// magnitude.
pub fn block_proof_equivalent_time<C: ChainIndex + ?Sized>(
    chain: &C,
    to: BlockId,
    from: BlockId,
    tip: BlockId,
    params: &ChainParams,
) -> ConsensusResult<i64> {
    let to_work = chain.chain_work(to)?;
    let from_work = chain.chain_work(from)?;
    let tip = chain.entry(tip)?;

    let (diff, sign) = if to_work > from_work {
        (to_work - from_work, 1i64)
    } else {
        (from_work - to_work, -1i64)
    };

    let tip_proof = block_proof(tip.bits);
    if tip_proof.is_zero() {
        return Err(ConsensusError::ZeroWork {
            first_height: tip.height,
            last_height: tip.height,
        });
    }

    let seconds = diff * BigUint::from(params.pow_target_spacing.unsigned_abs()) / tip_proof;
    if seconds.bits() > 63 {
        return Ok(sign * i64::MAX);
    }
    Ok(sign * low_u64(&seconds) as i64)
}
