//! Quadratic-exponential retarget.
//!
//! Takes the work of the last block and corrects it by a quadratic in the
//! elapsed time `t` (normalized by the target spacing `T`, with resistance
//! `r`):
//!
//! `correction = W*t/(T*r) - W/r - W*t^2/(T^2*r^2) + 2*W*t/(T*r^2) - W/r^2`
//!
//! which is zero at `t == T`. The parabola turns over at `t/T == r/2`, so
//! above `r/2 - 1` spacings the correction is frozen at its value for
//! `t/T == r/2 - 1`. The `t^2` factor is taken modulo 2^32 before it
//! multiplies the work, so for `t` above 65535 seconds the time branch no
//! longer follows the parabola and does not meet the frozen value.
//!
//! All other arithmetic wraps modulo 2^256 like the header target type, including
//! the subtraction of a negative correction.

use super::{suitable_block, TargetCalculator};
use crate::chain::{BlockId, ChainIndex};
use crate::compact::{encode_compact, target_from_work, truncate_u256, two_pow_256, CompactTarget};
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use num_traits::Zero;

/// Resistance constant.
pub const RESISTANCE: u64 = 1000;

/// Largest normalized time that uses the time-dependent branch.
pub const MAX_NORMALIZED_TIME: i64 = (RESISTANCE / 2 - 1) as i64;

/// Blocks below this height reuse their parent's target.
const MIN_HISTORY: u32 = 4;

fn wrapping_sub(a: &BigUint, b: &BigUint) -> BigUint {
    if a >= b {
        a - b
    } else {
        two_pow_256() - (b - a)
    }
}

fn wrapping_mul(a: &BigUint, b: u64) -> BigUint {
    truncate_u256(a * b)
}

/// Work of one block after the quadratic time correction.
///
/// `elapsed` is the 32-bit wrapped timestamp difference of the two
/// median-filtered reference blocks.
pub fn corrected_work(work: &BigUint, elapsed: u32, spacing: i64) -> BigUint {
    let r = RESISTANCE;
    let r2 = r * r;
    let t = u64::from(elapsed);
    let spacing = spacing as u64;
    let normalized_time = (t / spacing) as i64;

    let (a, c, d) = if normalized_time > MAX_NORMALIZED_TIME {
        let m = MAX_NORMALIZED_TIME as u64;
        let wm = wrapping_mul(work, m);
        (
            &wm / r,
            wrapping_mul(&wm, m) / r2,
            truncate_u256(&wm * 2u32) / r2,
        )
    } else {
        let wt = wrapping_mul(work, t) / spacing;
        (
            &wt / r,
            // 32-bit multiplier.
            wrapping_mul(work, u64::from(t.wrapping_mul(t) as u32)) / (spacing * spacing) / r2,
            truncate_u256(&wt * 2u32) / r2,
        )
    };
    let b = work / r;
    let e = work / r2;

    let correction = wrapping_sub(&truncate_u256(wrapping_sub(&wrapping_sub(&a, &b), &c) + d), &e);
    wrapping_sub(work, &correction)
}

impl<'a, C: ChainIndex + ?Sized> TargetCalculator<'a, C> {
    /// Quadratic-exponential target for the block after `prev`.
    pub fn next_quadratic_target(&self, prev: BlockId) -> ConsensusResult<CompactTarget> {
        let entry = self.chain.entry(prev)?;
        if entry.height < MIN_HISTORY {
            return Ok(entry.bits);
        }

        let parent = entry.prev.ok_or(ConsensusError::InsufficientHistory {
            height: entry.height,
            required: MIN_HISTORY,
        })?;
        let parent_entry = self.chain.entry(parent)?;
        let work = wrapping_sub(&entry.chain_work, &parent_entry.chain_work);

        let last = self.chain.entry(suitable_block(self.chain, prev)?)?;
        let first = self.chain.entry(suitable_block(self.chain, parent)?)?;
        let elapsed = last.time.wrapping_sub(first.time);

        let work = corrected_work(&work, elapsed, self.params.pow_target_spacing);
        if work.is_zero() {
            return Err(ConsensusError::ZeroWork {
                first_height: parent_entry.height,
                last_height: entry.height,
            });
        }

        Ok(encode_compact(&self.clamp_to_limit(target_from_work(&work))))
    }
}
