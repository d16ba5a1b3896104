//! Legacy windowed retarget with the emergency difficulty adjustment (EDA).

use super::TargetCalculator;
use crate::chain::{BlockId, BlockIndexEntry, ChainIndex};
use crate::chain_params::ChainParams;
use crate::compact::{encode_compact, truncate_u256, CompactTarget};
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use tracing::trace;

/// Twelve hours: the EDA trigger for six blocks of median-time-past.
const EDA_TRIGGER_SECS: i64 = 12 * 3600;

impl<'a, C: ChainIndex + ?Sized> TargetCalculator<'a, C> {
    /// Legacy target for the block after `prev`.
    ///
    /// Retargets once per adjustment interval. Between boundaries the target
    /// stays put, except for the minimum-difficulty rule on test networks and
    /// the EDA, which eases the target by 25% when six blocks took more than
    /// twelve hours of median time.
    pub fn next_legacy_target(
        &self,
        prev: BlockId,
        candidate_time: i64,
    ) -> ConsensusResult<CompactTarget> {
        let params = self.params;
        let entry = self.chain.entry(prev)?;
        let height = entry.height + 1;
        let interval = params.difficulty_adjustment_interval();

        if i64::from(height) % interval == 0 {
            // Only reachable once height >= interval.
            let first_height = (i64::from(height) - interval) as u32;
            let first = self
                .chain
                .ancestor(prev, first_height)
                .ok_or(ConsensusError::InsufficientHistory {
                    height: entry.height,
                    required: interval as u32,
                })?;
            let first_time = self.chain.entry(first)?.block_time();
            return Ok(calculate_next_work_required(entry, first_time, params));
        }

        let limit_bits = self.pow_limit_bits();

        if params.pow_allow_min_difficulty_blocks {
            if let Some(bits) = self.min_difficulty_escape(entry, candidate_time) {
                return Ok(bits);
            }

            // Last block that was not mined under the minimum-difficulty rule.
            let mut walk = entry;
            while let Some(parent) = walk.prev {
                if i64::from(walk.height) % interval == 0 || walk.bits != limit_bits {
                    break;
                }
                walk = self.chain.entry(parent)?;
            }
            return Ok(walk.bits);
        }

        if entry.bits == limit_bits {
            return Ok(limit_bits);
        }

        let six_back = height
            .checked_sub(7)
            .and_then(|h| self.chain.ancestor(prev, h))
            .ok_or(ConsensusError::InsufficientHistory {
                height: entry.height,
                required: 6,
            })?;
        let mtp_span =
            self.chain.median_time_past(prev)? - self.chain.median_time_past(six_back)?;
        if mtp_span < EDA_TRIGGER_SECS {
            return Ok(entry.bits);
        }

        let target = entry.bits.target();
        let eased = self.clamp_to_limit(&target + (&target >> 2u32));
        let bits = encode_compact(&eased);
        trace!(height, mtp_span, from = %entry.bits, to = %bits, "Emergency difficulty adjustment");
        Ok(bits)
    }
}

/// Retarget from the time taken by the last adjustment interval.
///
/// The measured timespan is clamped to a quarter and four times the target
/// timespan, so one retarget moves the target by at most a factor of four.
pub fn calculate_next_work_required(
    prev: &BlockIndexEntry,
    first_block_time: i64,
    params: &ChainParams,
) -> CompactTarget {
    if params.pow_no_retargeting {
        return prev.bits;
    }

    let timespan = params.pow_target_timespan;
    let actual = (prev.block_time() - first_block_time).clamp(timespan / 4, timespan * 4);

    // 256-bit product, as header targets are stored.
    let scaled = truncate_u256(prev.bits.target() * BigUint::from(actual as u64));
    let mut next = scaled / BigUint::from(timespan as u64);
    if next > params.pow_limit {
        next = params.pow_limit.clone();
    }

    encode_compact(&next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BlockTree;

    fn entry(height: u32, time: u32, bits: u32) -> BlockIndexEntry {
        BlockIndexEntry {
            height,
            time,
            bits: CompactTarget(bits),
            chain_work: BigUint::default(),
            prev: None,
            skip: None,
        }
    }

    #[test]
    fn test_calculate_next_work_required_vectors() {
        let params = ChainParams::mainnet();

        let prev = entry(32255, 1_262_152_739, 0x1d00ffff);
        assert_eq!(
            calculate_next_work_required(&prev, 1_261_130_161, &params),
            CompactTarget(0x1d00d86a)
        );

        // Already at the limit
        let prev = entry(2015, 1_233_061_996, 0x1d0fffff);
        assert_eq!(
            calculate_next_work_required(&prev, 1_231_006_505, &params),
            CompactTarget(0x1d0fffff)
        );

        // Lower bound on the measured timespan
        let prev = entry(68543, 1_279_297_671, 0x1c05a3f4);
        assert_eq!(
            calculate_next_work_required(&prev, 1_279_008_237, &params),
            CompactTarget(0x1c0168fd)
        );

        // Upper bound on the measured timespan
        let prev = entry(46367, 1_269_211_443, 0x1c387f6f);
        assert_eq!(
            calculate_next_work_required(&prev, 1_263_163_443, &params),
            CompactTarget(0x1d00e1fd)
        );
    }

    #[test]
    fn test_no_retargeting_returns_prev_bits() {
        let params = ChainParams::regtest();
        let prev = entry(2015, 1_000_000, 0x1d00ffff);
        assert_eq!(
            calculate_next_work_required(&prev, 0, &params),
            CompactTarget(0x1d00ffff)
        );
    }

    /// `count` blocks after genesis at `spacing` seconds, all with `bits`.
    fn build(count: u32, spacing: u32, bits: CompactTarget) -> (BlockTree, Vec<BlockId>) {
        let mut tree = BlockTree::new();
        let mut ids = vec![tree.insert_genesis(1_231_006_505, bits)];
        for _ in 0..count {
            let prev = ids[ids.len() - 1];
            let time = tree.get(prev).unwrap().time + spacing;
            ids.push(tree.insert(prev, time, bits).unwrap());
        }
        (tree, ids)
    }

    #[test]
    fn test_boundary_retarget_uses_window() {
        let params = ChainParams::mainnet();
        // 2015 blocks at half the spacing: target halves.
        let (tree, ids) = build(2015, 300, CompactTarget(0x1c0fffff));
        let calc = TargetCalculator::new(&tree, &params);
        let bits = calc.next_legacy_target(ids[2015], 0).unwrap();
        let expected = calculate_next_work_required(
            tree.get(ids[2015]).unwrap(),
            i64::from(tree.get(ids[0]).unwrap().time),
            &params,
        );
        assert_eq!(bits, expected);
        assert!(bits.target() < CompactTarget(0x1c0fffff).target());
    }

    #[test]
    fn test_off_boundary_keeps_bits() {
        let params = ChainParams::mainnet();
        let bits = CompactTarget(0x1c0fffff);
        let (tree, ids) = build(100, 600, bits);
        let calc = TargetCalculator::new(&tree, &params);
        assert_eq!(calc.next_legacy_target(ids[100], 0).unwrap(), bits);
    }

    #[test]
    fn test_eda_eases_after_slow_blocks() {
        let params = ChainParams::mainnet();
        let bits = CompactTarget(0x1c0fffff);
        // Three hours per block: six blocks of MTP span far exceed 12 h.
        let (tree, ids) = build(30, 3 * 3600, bits);
        let calc = TargetCalculator::new(&tree, &params);
        let next = calc.next_legacy_target(ids[30], 0).unwrap();

        let target = bits.target();
        assert_eq!(next, encode_compact(&(&target + (&target >> 2u32))));
        assert!(next.target() > target);
    }

    #[test]
    fn test_eda_keeps_bits_at_limit() {
        let params = ChainParams::mainnet();
        let (tree, ids) = build(30, 3 * 3600, CompactTarget(0x1d0fffff));
        let calc = TargetCalculator::new(&tree, &params);
        assert_eq!(calc.next_legacy_target(ids[30], 0).unwrap(), CompactTarget(0x1d0fffff));
    }

    #[test]
    fn test_eda_clamps_to_limit() {
        let params = ChainParams::mainnet();
        // Just under the limit: easing overshoots and clamps.
        let (tree, ids) = build(30, 3 * 3600, CompactTarget(0x1d0e0000));
        let calc = TargetCalculator::new(&tree, &params);
        assert_eq!(calc.next_legacy_target(ids[30], 0).unwrap(), CompactTarget(0x1d0fffff));
    }

    #[test]
    fn test_eda_needs_history() {
        let params = ChainParams::mainnet();
        let (tree, ids) = build(4, 3 * 3600, CompactTarget(0x1c0fffff));
        let calc = TargetCalculator::new(&tree, &params);
        assert_eq!(
            calc.next_legacy_target(ids[4], 0),
            Err(ConsensusError::InsufficientHistory {
                height: 4,
                required: 6
            })
        );
    }

    #[test]
    fn test_boundary_needs_full_interval() {
        let params = ChainParams::mainnet();
        let bits = CompactTarget(0x1d00ffff);
        let mut tree = BlockTree::new();
        let mut tip = tree.insert_root(2000, 1_300_000_000, bits, BigUint::from(1u32));
        for _ in 0..15 {
            let time = tree.get(tip).unwrap().time + 600;
            tip = tree.insert(tip, time, bits).unwrap();
        }
        let calc = TargetCalculator::new(&tree, &params);
        assert_eq!(
            calc.next_legacy_target(tip, 0),
            Err(ConsensusError::InsufficientHistory {
                height: 2015,
                required: 2016
            })
        );
    }

    #[test]
    fn test_min_difficulty_rules() {
        let mut params = ChainParams::testnet4();
        params.pow_target_spacing = 600;
        params.pow_target_timespan = 2016 * 600;
        let normal = CompactTarget(0x1c0fffff);
        let limit = encode_compact(&params.pow_limit);

        let (mut tree, ids) = build(20, 600, normal);
        let mut tip = ids[20];
        for _ in 0..3 {
            let time = tree.get(tip).unwrap().time + 1300;
            tip = tree.insert(tip, time, limit).unwrap();
        }
        let calc = TargetCalculator::new(&tree, &params);
        let tip_time = tree.get(tip).unwrap().block_time();

        // Late candidate: mined at the limit.
        assert_eq!(calc.next_legacy_target(tip, tip_time + 1201).unwrap(), limit);
        // On-time candidate: back to the last regular block's target.
        assert_eq!(calc.next_legacy_target(tip, tip_time + 600).unwrap(), normal);
    }
}
