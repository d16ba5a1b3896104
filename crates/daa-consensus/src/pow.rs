//! Proof-of-work check for a block hash.

use crate::chain_params::ChainParams;
use crate::compact::{decode_compact, CompactTarget};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::trace;

/// Whether `hash_le` (little-endian, as stored) meets the target `bits`.
///
/// Rejects encodings that are negative, overflow, decode to zero or exceed
/// the network's proof-of-work limit.
pub fn verify_proof_of_work(hash_le: &[u8; 32], bits: CompactTarget, params: &ChainParams) -> bool {
    let decoded = decode_compact(bits);

    if decoded.negative || decoded.overflow || decoded.target.is_zero() {
        trace!(%bits, negative = decoded.negative, overflow = decoded.overflow, "Invalid compact target");
        return false;
    }
    if decoded.target > params.pow_limit {
        trace!(%bits, "Target above proof-of-work limit");
        return false;
    }

    let hash = BigUint::from_bytes_le(hash_le);
    if hash > decoded.target {
        let hash_be: Vec<u8> = hash_le.iter().rev().copied().collect();
        trace!(%bits, hash = %hex::encode(hash_be), "Hash above target");
        return false;
    }

    true
}
