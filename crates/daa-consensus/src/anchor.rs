//! ASERT anchor resolution.
//!
//! The anchor is the first block of the ASERT regime on a branch: axion is
//! active for its parent-relative check but not for its parent's. A chain has
//! at most one such block, so the last answer is cached and reused for as long
//! as queries stay on a branch that contains it.

use crate::activation::is_axion_enabled;
use crate::chain::{BlockId, ChainIndex};
use crate::chain_params::ChainParams;
use crate::{ConsensusError, ConsensusResult};
use parking_lot::RwLock;
use tracing::trace;

/// Single-slot cache of the last resolved anchor.
///
/// Handles are only meaningful for the chain index the anchor was resolved
/// against; call [`AnchorCache::reset`] when swapping indexes or parameters.
#[derive(Debug, Default)]
pub struct AnchorCache {
    slot: RwLock<Option<BlockId>>,
}

impl AnchorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<BlockId> {
        *self.slot.read()
    }

    pub fn set(&self, anchor: BlockId) {
        *self.slot.write() = Some(anchor);
    }

    pub fn reset(&self) {
        *self.slot.write() = None;
    }
}

/// Find the ASERT anchor on the branch ending at `node`.
///
/// `node` must itself satisfy the axion predicate. The returned block
/// satisfies it while its parent does not (or it has no parent).
pub fn resolve_asert_anchor<C: ChainIndex + ?Sized>(
    chain: &C,
    params: &ChainParams,
    cache: &AnchorCache,
    node: BlockId,
) -> ConsensusResult<BlockId> {
    let entry = chain.entry(node)?;
    if !is_axion_enabled(chain, params, Some(node)) {
        return Err(ConsensusError::AnchorPrecondition {
            height: entry.height,
        });
    }

    if let Some(cached) = cache.get() {
        if let Some(cached_entry) = chain.get(cached) {
            if chain.ancestor(node, cached_entry.height) == Some(cached) {
                trace!(anchor = %cached, height = cached_entry.height, "ASERT anchor cache hit");
                return Ok(cached);
            }
        }
    }

    let mut anchor = node;
    let mut current = entry;
    while let Some(prev) = current.prev {
        // Large strides first; the skip ancestor is older than `prev`.
        if let Some(skip) = current.skip {
            if is_axion_enabled(chain, params, Some(skip)) {
                anchor = skip;
                current = chain.entry(skip)?;
                continue;
            }
        }
        if !is_axion_enabled(chain, params, Some(prev)) {
            break;
        }
        anchor = prev;
        current = chain.entry(prev)?;
    }

    trace!(anchor = %anchor, height = current.height, from = %node, "ASERT anchor resolved");
    cache.set(anchor);
    Ok(anchor)
}
