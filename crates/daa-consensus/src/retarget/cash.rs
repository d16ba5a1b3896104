//! Windowed work/time retarget over 144 median-filtered blocks.

use super::{suitable_block, TargetCalculator};
use crate::chain::{BlockId, ChainIndex};
use crate::chain_params::ChainParams;
use crate::compact::{encode_compact, target_from_work, truncate_u256, CompactTarget};
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use num_traits::Zero;

/// Blocks between the two reference blocks.
pub const CASH_WINDOW: u32 = 144;

impl<'a, C: ChainIndex + ?Sized> TargetCalculator<'a, C> {
    /// Cash target for the block after `prev`.
    pub fn next_cash_target(
        &self,
        prev: BlockId,
        candidate_time: i64,
    ) -> ConsensusResult<CompactTarget> {
        let params = self.params;
        let entry = self.chain.entry(prev)?;

        if let Some(bits) = self.min_difficulty_escape(entry, candidate_time) {
            return Ok(bits);
        }

        let interval = params.difficulty_adjustment_interval();
        if i64::from(entry.height) < interval {
            return Err(ConsensusError::InsufficientHistory {
                height: entry.height,
                required: interval as u32,
            });
        }

        let last = suitable_block(self.chain, prev)?;
        let short = ConsensusError::InsufficientHistory {
            height: entry.height,
            required: CASH_WINDOW,
        };
        let first_height = entry.height.checked_sub(CASH_WINDOW).ok_or(short.clone())?;
        let first_ref = self.chain.ancestor(prev, first_height).ok_or(short)?;
        let first = suitable_block(self.chain, first_ref)?;

        let target = compute_target(self.chain, first, last, params)?;
        Ok(encode_compact(&self.clamp_to_limit(target)))
    }
}

/// Target whose expected work matches the work rate between `first` and
/// `last`.
///
/// `W = (work(last) - work(first)) * spacing / elapsed`, with the elapsed
/// time clamped to `[72, 288]` spacings; the result is `(2^256 - W) / W`.
/// Not clamped to the proof-of-work limit.
pub fn compute_target<C: ChainIndex + ?Sized>(
    chain: &C,
    first: BlockId,
    last: BlockId,
    params: &ChainParams,
) -> ConsensusResult<BigUint> {
    let first_entry = chain.entry(first)?;
    let last_entry = chain.entry(last)?;
    let spacing = params.pow_target_spacing;

    let work_done = if last_entry.chain_work >= first_entry.chain_work {
        &last_entry.chain_work - &first_entry.chain_work
    } else {
        BigUint::zero()
    };
    let mut work = truncate_u256(work_done * BigUint::from(spacing as u64));

    let actual = (last_entry.block_time() - first_entry.block_time())
        .clamp(72 * spacing, 288 * spacing);
    work /= BigUint::from(actual as u64);

    if work.is_zero() {
        return Err(ConsensusError::ZeroWork {
            first_height: first_entry.height,
            last_height: last_entry.height,
        });
    }

    Ok(target_from_work(&work))
}
