//! Next-target computation.
//!
//! [`TargetCalculator`] borrows a chain index and network parameters for the
//! duration of a call. Each retargeting algorithm lives in its own module as
//! an `impl` block on the calculator; [`RetargetAlgorithm`] picks one per
//! call from the activation gate.

mod asert;
mod cash;
mod legacy;
mod quadratic;

pub use asert::calculate_asert;
pub use cash::compute_target;
pub use legacy::calculate_next_work_required;
pub use quadratic::corrected_work;

use crate::activation::{is_daa_enabled, is_phonon_enabled};
use crate::anchor::{resolve_asert_anchor, AnchorCache};
use crate::chain::{BlockId, BlockIndexEntry, ChainIndex};
use crate::chain_params::ChainParams;
use crate::compact::{encode_compact, CompactTarget};
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use std::fmt;
use tracing::{debug, trace};

/// Retargeting algorithms, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetargetAlgorithm {
    /// 2016-block window plus emergency adjustment.
    Legacy,
    /// 144-block median-filtered work/time ratio.
    Cash,
    /// Absolutely scheduled exponential target.
    Asert,
    /// Single-block work with quadratic time correction.
    QuadraticExp,
}

impl RetargetAlgorithm {
    pub const ALL: [RetargetAlgorithm; 4] = [
        RetargetAlgorithm::Legacy,
        RetargetAlgorithm::Cash,
        RetargetAlgorithm::Asert,
        RetargetAlgorithm::QuadraticExp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RetargetAlgorithm::Legacy => "legacy",
            RetargetAlgorithm::Cash => "cash",
            RetargetAlgorithm::Asert => "asert",
            RetargetAlgorithm::QuadraticExp => "quadratic_exp",
        }
    }

    /// Algorithm governing the block after `prev`.
    ///
    /// Never returns `Asert`: ASERT has its own entry points on
    /// [`TargetCalculator`] since it needs an anchor.
    pub fn select<C: ChainIndex + ?Sized>(
        chain: &C,
        params: &ChainParams,
        prev: BlockId,
    ) -> Self {
        if is_phonon_enabled(chain, params, Some(prev)) {
            RetargetAlgorithm::QuadraticExp
        } else if is_daa_enabled(chain, params, Some(prev)) {
            RetargetAlgorithm::Cash
        } else {
            RetargetAlgorithm::Legacy
        }
    }

    /// Run this algorithm.
    pub fn compute<C: ChainIndex + ?Sized>(
        self,
        calc: &TargetCalculator<'_, C>,
        request: &RetargetRequest,
    ) -> ConsensusResult<CompactTarget> {
        match self {
            RetargetAlgorithm::Legacy => {
                calc.next_legacy_target(request.prev, request.candidate_time)
            }
            RetargetAlgorithm::Cash => calc.next_cash_target(request.prev, request.candidate_time),
            RetargetAlgorithm::Asert => {
                calc.next_asert_target(request.prev, request.candidate_time, request.anchor)
            }
            RetargetAlgorithm::QuadraticExp => calc.next_quadratic_target(request.prev),
        }
    }
}

impl fmt::Display for RetargetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs shared by all algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetargetRequest {
    /// Parent of the candidate block.
    pub prev: BlockId,
    /// Candidate block timestamp.
    pub candidate_time: i64,
    /// ASERT anchor for networks without a pinned one.
    pub anchor: Option<BlockId>,
}

/// Target calculator.
///
/// Uses ChainParams for network-specific values.
pub struct TargetCalculator<'a, C: ChainIndex + ?Sized> {
    chain: &'a C,
    params: &'a ChainParams,
}

impl<'a, C: ChainIndex + ?Sized> TargetCalculator<'a, C> {
    /// Create a new calculator over the given chain index and parameters.
    pub fn new(chain: &'a C, params: &'a ChainParams) -> Self {
        Self { chain, params }
    }

    pub fn chain(&self) -> &'a C {
        self.chain
    }

    pub fn params(&self) -> &'a ChainParams {
        self.params
    }

    /// Compact target required of the block after `prev`.
    ///
    /// # Arguments
    /// * `prev` - Parent of the candidate block. Must be present.
    /// * `candidate_time` - Timestamp of the candidate block header.
    pub fn next_required_target(
        &self,
        prev: Option<BlockId>,
        candidate_time: i64,
    ) -> ConsensusResult<CompactTarget> {
        let prev = prev.ok_or(ConsensusError::MissingPredecessor)?;
        let entry = self.chain.entry(prev)?;

        if self.params.pow_no_retargeting {
            return Ok(entry.bits);
        }

        let algorithm = RetargetAlgorithm::select(self.chain, self.params, prev);
        let bits = algorithm.compute(
            self,
            &RetargetRequest {
                prev,
                candidate_time,
                anchor: None,
            },
        )?;

        debug!(
            algorithm = algorithm.name(),
            height = entry.height + 1,
            prev_bits = %entry.bits,
            bits = %bits,
            "Calculated next required target"
        );
        Ok(bits)
    }

    /// ASERT target for the block after `prev`, resolving the anchor through
    /// `cache` when the network has no pinned anchor.
    pub fn next_asert_target_cached(
        &self,
        cache: &AnchorCache,
        prev: BlockId,
        candidate_time: i64,
    ) -> ConsensusResult<CompactTarget> {
        let anchor = match self.params.asert_anchor {
            Some(_) => None,
            None => Some(resolve_asert_anchor(self.chain, self.params, cache, prev)?),
        };
        let bits = self.next_asert_target(prev, candidate_time, anchor)?;

        debug!(
            algorithm = RetargetAlgorithm::Asert.name(),
            height = self.chain.entry(prev)?.height + 1,
            bits = %bits,
            "Calculated next required target"
        );
        Ok(bits)
    }

    /// Compact encoding of the proof-of-work limit.
    pub(crate) fn pow_limit_bits(&self) -> CompactTarget {
        encode_compact(&self.params.pow_limit)
    }

    /// `min(target, pow_limit)`.
    pub(crate) fn clamp_to_limit(&self, target: BigUint) -> BigUint {
        if target > self.params.pow_limit {
            self.params.pow_limit.clone()
        } else {
            target
        }
    }

    /// On networks allowing minimum-difficulty blocks, a candidate more than
    /// two spacings after its parent may be mined at the limit.
    pub(crate) fn min_difficulty_escape(
        &self,
        prev: &BlockIndexEntry,
        candidate_time: i64,
    ) -> Option<CompactTarget> {
        if self.params.pow_allow_min_difficulty_blocks
            && candidate_time > prev.block_time() + 2 * self.params.pow_target_spacing
        {
            trace!(
                height = prev.height + 1,
                candidate_time,
                prev_time = prev.time,
                "Minimum-difficulty block allowed"
            );
            return Some(self.pow_limit_bits());
        }
        None
    }
}

/// Block with the median timestamp among `id` and its two predecessors.
///
/// Filters out a single block with a skewed timestamp. `id` must be at
/// height 2 or above, the lowest height with two predecessors. The quadratic
/// rule only calls it at height 3 or above.
pub fn suitable_block<C: ChainIndex + ?Sized>(chain: &C, id: BlockId) -> ConsensusResult<BlockId> {
    let entry = chain.entry(id)?;
    let prev = entry.prev.ok_or(ConsensusError::InsufficientHistory {
        height: entry.height,
        required: 2,
    })?;
    let prev_entry = chain.entry(prev)?;
    let prev_prev = prev_entry.prev.ok_or(ConsensusError::InsufficientHistory {
        height: entry.height,
        required: 2,
    })?;
    let prev_prev_entry = chain.entry(prev_prev)?;

    let mut blocks = [
        (prev_prev, prev_prev_entry.time),
        (prev, prev_entry.time),
        (id, entry.time),
    ];

    // Sorting network.
    if blocks[0].1 > blocks[2].1 {
        blocks.swap(0, 2);
    }
    if blocks[0].1 > blocks[1].1 {
        blocks.swap(0, 1);
    }
    if blocks[1].1 > blocks[2].1 {
        blocks.swap(1, 2);
    }

    Ok(blocks[1].0)
}
