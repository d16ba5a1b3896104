//! ASERT: absolutely scheduled exponentially rising targets.
//!
//! The target follows an ideal schedule anchored at one reference block.
//! Every half-life of accumulated lateness doubles the target, and every
//! half-life of earliness halves it:
//!
//! `next = ref * 2^((time_diff - spacing * (height_diff + 1)) / half_life)`
//!
//! computed in 16.16 fixed point with [`exp2_fraction`] for the fractional
//! part.

use super::TargetCalculator;
use crate::chain::{BlockId, ChainIndex};
use crate::chain_params::AsertAnchor;
use crate::compact::{encode_compact, CompactTarget};
use crate::fixed_point::exp2_fraction;
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Largest `|time_diff - spacing * height_diff|` the fixed-point exponent
/// can hold.
const MAX_SCHEDULE_DEVIATION: i64 = 1 << (63 - 16);

impl<'a, C: ChainIndex + ?Sized> TargetCalculator<'a, C> {
    /// ASERT target for the block after `prev`.
    ///
    /// A pinned anchor in the network parameters takes precedence over
    /// `anchor`. Without either this fails with `MissingAnchor`.
    pub fn next_asert_target(
        &self,
        prev: BlockId,
        candidate_time: i64,
        anchor: Option<BlockId>,
    ) -> ConsensusResult<CompactTarget> {
        let params = self.params;
        let entry = self.chain.entry(prev)?;

        let anchor = match (params.asert_anchor, anchor) {
            (Some(pinned), _) => pinned,
            (None, Some(id)) => self.anchor_params(id)?,
            (None, None) => return Err(ConsensusError::MissingAnchor),
        };

        if entry.height < anchor.height {
            return Err(ConsensusError::AnchorAboveTip {
                anchor_height: anchor.height,
                tip_height: entry.height,
            });
        }

        if let Some(bits) = self.min_difficulty_escape(entry, candidate_time) {
            return Ok(bits);
        }

        if entry.prev.is_none() {
            return Err(ConsensusError::InsufficientHistory {
                height: entry.height,
                required: 1,
            });
        }

        let ref_target = anchor.bits.target();
        let time_diff = entry.block_time() - anchor.prev_block_time;
        let height_diff = i64::from(entry.height - anchor.height);

        let next = calculate_asert(
            &ref_target,
            params.pow_target_spacing,
            time_diff,
            height_diff,
            &params.pow_limit,
            params.asert_half_life,
        )?;
        Ok(encode_compact(&next))
    }

    /// Reference values of an anchor block: its height and bits, and its
    /// parent's timestamp (its own for a root).
    fn anchor_params(&self, id: BlockId) -> ConsensusResult<AsertAnchor> {
        let anchor = self.chain.entry(id)?;
        let prev_block_time = match anchor.prev {
            Some(parent) => self.chain.entry(parent)?.block_time(),
            None => anchor.block_time(),
        };
        Ok(AsertAnchor {
            height: anchor.height,
            bits: anchor.bits,
            prev_block_time,
        })
    }
}

/// ASERT target from reference values. Clamped to `[1, pow_limit]`.
///
/// # Arguments
/// * `ref_target` - Anchor block target, in `(0, pow_limit]`.
/// * `time_diff` - Seconds from the anchor's parent to the block being extended.
/// * `height_diff` - Blocks from the anchor to the block being extended, non-negative.
/// * `pow_limit` - Needs 32 leading zero bits.
pub fn calculate_asert(
    ref_target: &BigUint,
    spacing: i64,
    time_diff: i64,
    height_diff: i64,
    pow_limit: &BigUint,
    half_life: i64,
) -> ConsensusResult<BigUint> {
    if ref_target.is_zero() || ref_target > pow_limit {
        return Err(ConsensusError::InvalidReferenceTarget(format!(
            "{:#x} not in (0, {:#x}]",
            ref_target, pow_limit
        )));
    }
    if !(pow_limit >> 224u32).is_zero() {
        return Err(ConsensusError::InsufficientHeadroom);
    }

    let out_of_range = ConsensusError::ExponentOutOfRange {
        time_diff,
        height_diff,
    };
    if height_diff < 0 || half_life <= 0 {
        return Err(out_of_range);
    }
    let deviation = spacing
        .checked_mul(height_diff)
        .and_then(|scheduled| time_diff.checked_sub(scheduled))
        .filter(|d| d.checked_abs().map_or(false, |abs| abs < MAX_SCHEDULE_DEVIATION))
        .ok_or_else(|| out_of_range.clone())?;

    let exponent = deviation
        .checked_sub(spacing)
        .and_then(|d| d.checked_mul(65536))
        .map(|d| d / half_life)
        .ok_or(out_of_range)?;

    // Floored split: `exponent == shifts * 65536 + frac`.
    let mut shifts = exponent >> 16;
    let frac = exponent as u16;
    let factor = exp2_fraction(frac);

    // Below 2^241 since ref_target < 2^224.
    let mut next = ref_target * factor;

    shifts -= 16;
    if shifts <= 0 {
        next >>= shifts.unsigned_abs();
    } else if next.bits() + shifts as u64 > 256 {
        // Would wrap 256 bits; anything that large clamps anyway.
        next = pow_limit.clone();
    } else {
        next <<= shifts as u64;
    }

    if next.is_zero() {
        Ok(BigUint::one())
    } else if &next > pow_limit {
        Ok(pow_limit.clone())
    } else {
        Ok(next)
    }
}
