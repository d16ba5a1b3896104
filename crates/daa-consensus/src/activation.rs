//! Network upgrade activation.
//!
//! Every predicate is evaluated against the predecessor of the block being
//! built or validated. No predecessor (or a handle the index doesn't know)
//! means no upgrade is active.

use crate::chain::{BlockId, BlockIndexEntry, ChainIndex};
use crate::chain_params::ChainParams;
use std::fmt;

/// Consensus upgrades that gate retargeting behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Upgrade {
    /// Chain split; emergency difficulty adjustment.
    Uahf,
    /// Windowed work/time retarget.
    Daa,
    MagneticAnomaly,
    Graviton,
    /// Quadratic-exponential retarget.
    Phonon,
    /// ASERT regime start.
    Axion,
    Ema,
    Tachyon,
}

impl Upgrade {
    pub const ALL: [Upgrade; 8] = [
        Upgrade::Uahf,
        Upgrade::Daa,
        Upgrade::MagneticAnomaly,
        Upgrade::Graviton,
        Upgrade::Phonon,
        Upgrade::Axion,
        Upgrade::Ema,
        Upgrade::Tachyon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Upgrade::Uahf => "uahf",
            Upgrade::Daa => "daa",
            Upgrade::MagneticAnomaly => "magnetic_anomaly",
            Upgrade::Graviton => "graviton",
            Upgrade::Phonon => "phonon",
            Upgrade::Axion => "axion",
            Upgrade::Ema => "ema",
            Upgrade::Tachyon => "tachyon",
        }
    }

    /// Whether this upgrade is active for a block whose parent is `prev`.
    pub fn is_enabled<C: ChainIndex + ?Sized>(
        self,
        chain: &C,
        params: &ChainParams,
        prev: Option<BlockId>,
    ) -> bool {
        match self {
            Upgrade::Uahf => is_uahf_enabled(chain, params, prev),
            Upgrade::Daa => is_daa_enabled(chain, params, prev),
            Upgrade::MagneticAnomaly => is_magnetic_anomaly_enabled(chain, params, prev),
            Upgrade::Graviton => is_graviton_enabled(chain, params, prev),
            Upgrade::Phonon => is_phonon_enabled(chain, params, prev),
            Upgrade::Axion => is_axion_enabled(chain, params, prev),
            Upgrade::Ema => is_ema_enabled(chain, params, prev),
            Upgrade::Tachyon => is_tachyon_enabled(chain, params, prev),
        }
    }
}

impl fmt::Display for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn prev_entry<C: ChainIndex + ?Sized>(chain: &C, prev: Option<BlockId>) -> Option<&BlockIndexEntry> {
    prev.and_then(|id| chain.get(id))
}

fn height_at_least<C: ChainIndex + ?Sized>(chain: &C, prev: Option<BlockId>, height: u32) -> bool {
    prev_entry(chain, prev).map_or(false, |entry| entry.height >= height)
}

fn mtp_at_least<C: ChainIndex + ?Sized>(chain: &C, prev: Option<BlockId>, time: i64) -> bool {
    prev.and_then(|id| chain.median_time_past(id).ok())
        .map_or(false, |mtp| mtp >= time)
}

pub fn is_uahf_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    height_at_least(chain, prev, params.uahf_height)
}

pub fn is_daa_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    height_at_least(chain, prev, params.daa_height)
}

pub fn is_magnetic_anomaly_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    height_at_least(chain, prev, params.magnetic_anomaly_height)
}

pub fn is_graviton_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    height_at_least(chain, prev, params.graviton_height)
}

pub fn is_phonon_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    height_at_least(chain, prev, params.phonon_height)
}

/// Axion is pinned to the anchor height on networks with a pinned anchor,
/// and activates by median-time-past everywhere else.
pub fn is_axion_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    match &params.asert_anchor {
        Some(anchor) => height_at_least(chain, prev, anchor.height),
        None => mtp_at_least(chain, prev, params.effective_axion_activation_time()),
    }
}

pub fn is_ema_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    mtp_at_least(chain, prev, params.effective_ema_activation_time())
}

pub fn is_tachyon_enabled<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    prev: Option<BlockId>,
) -> bool {
    mtp_at_least(chain, prev, params.effective_tachyon_activation_time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BlockTree;
    use crate::chain_params::{ActivationOverrides, AsertAnchor};
    use crate::compact::CompactTarget;

    const BITS: CompactTarget = CompactTarget(0x207fffff);

    /// Chain of `len` blocks, one per 600 s from `start`.
    fn chain(start: u32, len: u32) -> (BlockTree, Vec<BlockId>) {
        let mut tree = BlockTree::new();
        let mut ids = vec![tree.insert_genesis(start, BITS)];
        for i in 1..len {
            let prev = ids[ids.len() - 1];
            ids.push(tree.insert(prev, start + i * 600, BITS).unwrap());
        }
        (tree, ids)
    }

    #[test]
    fn test_absent_predecessor_disables_everything() {
        let tree = BlockTree::new();
        let params = ChainParams::regtest();
        for upgrade in Upgrade::ALL {
            assert!(!upgrade.is_enabled(&tree, &params, None), "{}", upgrade);
            assert!(!upgrade.is_enabled(&tree, &params, Some(BlockId(0))), "{}", upgrade);
        }
    }

    #[test]
    fn test_height_gate_boundary() {
        let params = ChainParams::testnet4();
        let (tree, ids) = chain(1_000_000, 3002);
        assert!(!is_daa_enabled(&tree, &params, Some(ids[2999])));
        assert!(is_daa_enabled(&tree, &params, Some(ids[3000])));
        assert!(!is_uahf_enabled(&tree, &params, Some(ids[5])));
        assert!(is_uahf_enabled(&tree, &params, Some(ids[6])));
        assert!(is_phonon_enabled(&tree, &params, Some(ids[0])));
        assert!(!Upgrade::MagneticAnomaly.is_enabled(&tree, &params, Some(ids[3001])));
    }

    #[test]
    fn test_time_gate_uses_median_time_past() {
        let start = 1_000_000u32;
        let (tree, ids) = chain(start, 40);
        // MTP at height 20 is the timestamp at height 15.
        let mtp = i64::from(start + 15 * 600);
        assert_eq!(tree.median_time_past(ids[20]).unwrap(), mtp);

        let params = ChainParams::regtest().with_overrides(ActivationOverrides {
            tachyon_activation_time: Some(mtp),
            ema_activation_time: Some(mtp + 1),
            ..Default::default()
        });
        assert!(!is_tachyon_enabled(&tree, &params, Some(ids[19])));
        assert!(is_tachyon_enabled(&tree, &params, Some(ids[20])));
        assert!(!is_ema_enabled(&tree, &params, Some(ids[20])));
        assert!(is_ema_enabled(&tree, &params, Some(ids[21])));
    }

    #[test]
    fn test_axion_dual_rule() {
        let (tree, ids) = chain(1_000_000, 40);

        let mut pinned = ChainParams::regtest();
        pinned.asert_anchor = Some(AsertAnchor {
            height: 25,
            bits: BITS,
            prev_block_time: 0,
        });
        // Override is ignored while an anchor is pinned.
        let pinned = pinned.with_overrides(ActivationOverrides {
            axion_activation_time: Some(0),
            ..Default::default()
        });
        assert!(!is_axion_enabled(&tree, &pinned, Some(ids[24])));
        assert!(is_axion_enabled(&tree, &pinned, Some(ids[25])));

        let mtp_at_30 = tree.median_time_past(ids[30]).unwrap();
        let by_time = ChainParams::regtest().with_overrides(ActivationOverrides {
            axion_activation_time: Some(mtp_at_30),
            ..Default::default()
        });
        assert!(!is_axion_enabled(&tree, &by_time, Some(ids[29])));
        assert!(is_axion_enabled(&tree, &by_time, Some(ids[30])));
    }

    #[test]
    fn test_activation_is_monotonic_along_chain() {
        let (tree, ids) = chain(1_605_430_000, 200);
        let params = ChainParams::scalenet();
        for upgrade in Upgrade::ALL {
            let mut seen = false;
            for id in &ids {
                let enabled = upgrade.is_enabled(&tree, &params, Some(*id));
                assert!(!seen || enabled, "{} deactivated at {}", upgrade, id);
                seen |= enabled;
            }
        }
    }
}
