//! Error types for target computation.
//!
//! Every variant here is a caller-contract breach: the chain state handed to
//! the retargeting code does not satisfy an algorithm's preconditions. The
//! embedding validation layer treats these as fatal. Malformed compact targets
//! on candidate blocks are not errors; `verify_proof_of_work` reports them as
//! `false`.

use crate::chain::BlockId;
use thiserror::Error;

/// Consensus precondition violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// A predecessor block was required but none was supplied.
    #[error("Missing predecessor block")]
    MissingPredecessor,

    /// A block handle does not belong to the chain index.
    #[error("Unknown block: {0}")]
    UnknownBlock(BlockId),

    /// Not enough ancestors to run the algorithm.
    #[error("Insufficient history at height {height}: need at least {required}")]
    InsufficientHistory { height: u32, required: u32 },

    /// ASERT needs either pinned anchor parameters or an explicit anchor block.
    #[error("No ASERT anchor: network has no pinned anchor and none was supplied")]
    MissingAnchor,

    /// The ASERT anchor lies above the block being extended.
    #[error("ASERT anchor at height {anchor_height} is above tip height {tip_height}")]
    AnchorAboveTip { anchor_height: u32, tip_height: u32 },

    /// Anchor resolution was requested for a block where axion is not active.
    #[error("Axion is not enabled at height {height}, no anchor to resolve")]
    AnchorPrecondition { height: u32 },

    /// ASERT reference target is zero or above the proof-of-work limit.
    #[error("Invalid ASERT reference target: {0}")]
    InvalidReferenceTarget(String),

    /// The proof-of-work limit lacks the 32 leading zero bits ASERT needs.
    #[error("Proof-of-work limit has fewer than 32 leading zero bits")]
    InsufficientHeadroom,

    /// Negative height difference, or `|time_diff - spacing * height_diff|` too
    /// large for the fixed-point exponent.
    #[error("ASERT exponent out of range: time diff {time_diff}, height diff {height_diff}")]
    ExponentOutOfRange { time_diff: i64, height_diff: i64 },

    /// Work between two reference blocks came out as zero.
    #[error("Zero work between heights {first_height} and {last_height}")]
    ZeroWork { first_height: u32, last_height: u32 },
}

/// Result type for target computation.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
