//! # daa-consensus
//!
//! Proof-of-work target computation for the next block.
//!
//! This crate provides:
//! - Compact ("nBits") target codec and per-block work
//! - A chain index contract with skip-pointer ancestor lookups, plus an
//!   in-memory arena implementing it
//! - Upgrade activation predicates
//! - Four retargeting algorithms behind one dispatcher
//! - Proof-of-work verification of block hashes
//!
//! ## Retargeting
//!
//! The dispatcher picks the newest active algorithm for the parent block:
//! - quadratic-exponential once phonon is active
//! - cash (144-block work/time window) once the DAA is active
//! - legacy 2016-block windows with the emergency adjustment otherwise
//!
//! ASERT is computed through its own entry points, since it needs an anchor
//! block that is either pinned by the network or resolved from the chain
//! through an [`AnchorCache`].
//!
//! All computation is synchronous and reads already-validated chain state.
//! The anchor cache is the only shared mutable state.

mod activation;
mod anchor;
pub mod chain;
mod chain_params;
mod compact;
mod error;
mod fixed_point;
mod pow;
mod retarget;

pub use activation::{
    is_axion_enabled, is_daa_enabled, is_ema_enabled, is_graviton_enabled,
    is_magnetic_anomaly_enabled, is_phonon_enabled, is_tachyon_enabled, is_uahf_enabled, Upgrade,
};
pub use anchor::{resolve_asert_anchor, AnchorCache};
pub use chain::{block_proof_equivalent_time, BlockId, BlockIndexEntry, BlockTree, ChainIndex};
pub use chain_params::{
    ActivationOverrides, AsertAnchor, ChainParams, ChainParamsConfig, ChainParamsError, Network,
};
pub use compact::{block_proof, decode_compact, encode_compact, CompactTarget, DecodedTarget};
pub use error::{ConsensusError, ConsensusResult};
pub use fixed_point::exp2_fraction;
pub use pow::verify_proof_of_work;
pub use retarget::{
    calculate_asert, calculate_next_work_required, compute_target, corrected_work, suitable_block,
    RetargetAlgorithm, RetargetRequest, TargetCalculator,
};
