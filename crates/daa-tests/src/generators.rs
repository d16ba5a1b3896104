//! Test data generators for integration tests.
//!
//! Deterministic block-interval schedules and hash fixtures.

use daa_consensus::CompactTarget;
use num_bigint::BigUint;
use num_traits::One;

/// `count` intervals of exactly `spacing` seconds.
pub fn on_schedule(count: usize, spacing: i64) -> Vec<i64> {
    vec![spacing; count]
}

/// Intervals spread uniformly over `[spacing / 2, 3 * spacing / 2]`,
/// reproducible from `seed`.
pub fn jittered(seed: u64, count: usize, spacing: i64) -> Vec<i64> {
    let mut state = seed;
    let span = (spacing as u64).max(1);
    (0..count)
        .map(|_| spacing / 2 + (splitmix64(&mut state) % (span + 1)) as i64)
        .collect()
}

/// Alternating bursts of fast and slow blocks, `period` blocks each.
pub fn oscillating(count: usize, spacing: i64, period: usize) -> Vec<i64> {
    let period = period.max(1);
    (0..count)
        .map(|i| {
            if (i / period) % 2 == 0 {
                spacing / 4
            } else {
                spacing * 4
            }
        })
        .collect()
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// `2^bits - 1`.
pub fn all_ones(bits: u32) -> BigUint {
    (BigUint::one() << bits) - 1u32
}

/// Little-endian hash whose value is exactly `value`.
///
/// Panics if `value` needs more than 256 bits.
pub fn hash_le(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_le();
    assert!(bytes.len() <= 32, "hash value wider than 256 bits");
    let mut hash = [0u8; 32];
    hash[..bytes.len()].copy_from_slice(&bytes);
    hash
}

/// Hash exactly at the target `bits` decodes to.
pub fn hash_at_target(bits: CompactTarget) -> [u8; 32] {
    hash_le(&bits.target())
}

/// Hash one above the target `bits` decodes to.
pub fn hash_above_target(bits: CompactTarget) -> [u8; 32] {
    hash_le(&(bits.target() + 1u32))
}
