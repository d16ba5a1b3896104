//! Skip-pointer height selection.
//!
//! Each block links to one earlier ancestor at a height chosen so that
//! ancestor lookups take O(log n) hops.

/// Clear the lowest set bit.
pub fn invert_lowest_one(n: u32) -> u32 {
    n & n.wrapping_sub(1)
}

/// Height of the skip ancestor for a block at `height`.
///
/// Any height lower than `height` would be valid; this choice keeps
/// `ChainIndex::ancestor` walks logarithmic.
pub fn skip_height(height: u32) -> u32 {
    if height < 2 {
        return 0;
    }
    if height & 1 == 1 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}
