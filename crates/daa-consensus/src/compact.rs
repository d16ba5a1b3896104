//! Compact ("nBits") target encoding.
//!
//! A compact target packs a 256-bit threshold into 32 bits:
//! - size: top byte, the byte length of the target
//! - word: low 23 bits, the most significant bytes of the target
//! - sign: bit 0x00800000
//!
//! Decoding is exact. Encoding keeps only the three most significant bytes,
//! so targets with more than 24 significant bits lose their low-order bits.
//! This truncation is part of consensus and must not be "fixed".

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sign bit inside the mantissa.
const SIGN_BIT: u32 = 0x0080_0000;

/// Mantissa mask (sign bit excluded).
const WORD_MASK: u32 = 0x007f_ffff;

/// A 32-bit compact target, as carried in block headers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactTarget(pub u32);

impl CompactTarget {
    /// Raw consensus value.
    pub fn to_consensus(self) -> u32 {
        self.0
    }

    /// Decode into a 256-bit target with sign/overflow flags.
    pub fn decode(self) -> DecodedTarget {
        decode_compact(self)
    }

    /// Decode, keeping only the magnitude.
    ///
    /// Matches `SetCompact` without flag checks: callers retargeting from an
    /// already-validated header use this.
    pub fn target(self) -> BigUint {
        decode_compact(self).target
    }
}

impl fmt::Debug for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompactTarget")
            .field(&format_args!("{:#010x}", self.0))
            .finish()
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Result of decoding a compact target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTarget {
    /// Magnitude, truncated to 256 bits.
    pub target: BigUint,
    /// Sign bit set on a non-zero mantissa.
    pub negative: bool,
    /// Magnitude does not fit in 256 bits.
    pub overflow: bool,
}

impl DecodedTarget {
    /// Positive, representable and non-zero.
    pub fn is_valid(&self) -> bool {
        !self.negative && !self.overflow && !self.target.is_zero()
    }
}

/// 2^256.
pub(crate) fn two_pow_256() -> BigUint {
    BigUint::one() << 256u32
}

/// Reduce a value modulo 2^256, as 256-bit unsigned arithmetic does.
pub(crate) fn truncate_u256(value: BigUint) -> BigUint {
    if value.bits() > 256 {
        value % two_pow_256()
    } else {
        value
    }
}

/// Low 64 bits of a value.
pub(crate) fn low_u64(value: &BigUint) -> u64 {
    value.iter_u64_digits().next().unwrap_or(0)
}

/// Decode a compact target.
pub fn decode_compact(bits: CompactTarget) -> DecodedTarget {
    let compact = bits.0;
    let size = compact >> 24;
    let mut word = compact & WORD_MASK;

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        BigUint::from(word)
    } else {
        truncate_u256(BigUint::from(word) << (8 * (size - 3)))
    };

    let negative = word != 0 && (compact & SIGN_BIT) != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

    DecodedTarget {
        target,
        negative,
        overflow,
    }
}

/// Encode a (non-negative) target as a compact value.
///
/// Picks the smallest size whose mantissa fits in three bytes without the
/// sign bit set; a mantissa of 0x800000 or more is shifted down one byte and
/// the size bumped.
pub fn encode_compact(target: &BigUint) -> CompactTarget {
    let mut size = ((target.bits() + 7) / 8) as u32;

    let mut compact = if size <= 3 {
        (low_u64(target) << (8 * (3 - size))) as u32
    } else {
        low_u64(&(target >> (8 * (size - 3)))) as u32
    };

    if compact & SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }

    CompactTarget(compact | (size << 24))
}

/// Work represented by a block with the given target: `2^256 / (target + 1)`.
///
/// Zero for negative, overflowing or zero encodings.
pub fn block_proof(bits: CompactTarget) -> BigUint {
    let decoded = decode_compact(bits);
    if !decoded.is_valid() {
        return BigUint::zero();
    }
    two_pow_256() / (decoded.target + 1u32)
}

/// `(2^256 - work) / work`, i.e. the target whose expected work is `work`.
///
/// `work` must be non-zero.
pub(crate) fn target_from_work(work: &BigUint) -> BigUint {
    (two_pow_256() - work) / work
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_target(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_decode_known_values() {
        let decoded = decode_compact(CompactTarget(0x1d00ffff));
        assert_eq!(
            decoded.target,
            hex_target("00000000ffff0000000000000000000000000000000000000000000000000000")
        );
        assert!(decoded.is_valid());

        assert_eq!(decode_compact(CompactTarget(0x05009234)).target, BigUint::from(0x92340000u32));
        assert_eq!(decode_compact(CompactTarget(0x01120000)).target, BigUint::from(0x12u32));
        assert_eq!(decode_compact(CompactTarget(0x02123456)).target, BigUint::from(0x1234u32));
    }

    #[test]
    fn test_decode_zero_mantissa_is_zero() {
        for bits in [0x00000000u32, 0x00123456, 0x01003456, 0x02000056, 0x03000000, 0x04000000] {
            let decoded = decode_compact(CompactTarget(bits));
            assert!(decoded.target.is_zero(), "bits {:#x}", bits);
            assert!(!decoded.negative);
            assert!(!decoded.overflow);
            assert!(!decoded.is_valid());
        }
    }

    #[test]
    fn test_decode_negative() {
        let decoded = decode_compact(CompactTarget(0x04923456));
        assert!(decoded.negative);
        assert!(!decoded.is_valid());

        // Sign is checked after the size shift.
        assert!(decode_compact(CompactTarget(0x01fedcba)).negative);
        assert!(!decode_compact(CompactTarget(0x00800000)).negative);
    }

    #[test]
    fn test_decode_overflow() {
        assert!(decode_compact(CompactTarget(0xff123456)).overflow);
        assert!(decode_compact(CompactTarget(0x23000001)).overflow);
        assert!(!decode_compact(CompactTarget(0x22000001)).overflow);
        assert!(decode_compact(CompactTarget(0x22000100)).overflow);
        assert!(!decode_compact(CompactTarget(0x21000100)).overflow);
        assert!(decode_compact(CompactTarget(0x21010000)).overflow);
        assert!(!decode_compact(CompactTarget(0x20010000)).overflow);
    }

    #[test]
    fn test_encode_normalizes_sign_byte() {
        // 0x80 would read back as negative: pushed into the next byte.
        assert_eq!(encode_compact(&BigUint::from(0x80u32)), CompactTarget(0x02008000));
        assert_eq!(encode_compact(&BigUint::from(0x12u32)), CompactTarget(0x01120000));
        assert_eq!(encode_compact(&BigUint::from(0x1234u32)), CompactTarget(0x02123400));
        assert_eq!(encode_compact(&BigUint::zero()), CompactTarget(0));
    }

    #[test]
    fn test_encode_truncates_low_bits() {
        let value = BigUint::from(0x1234_5678u32);
        let encoded = encode_compact(&value);
        assert_eq!(encoded, CompactTarget(0x04123456));
        assert_eq!(encoded.target(), BigUint::from(0x1234_5600u32));
    }

    #[test]
    fn test_roundtrip_pow_limits() {
        for limit in [
            "0000000fffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        ] {
            // Compact form of the limit decodes to its three-byte truncation,
            // which itself round-trips losslessly.
            let truncated = encode_compact(&hex_target(limit)).target();
            assert_eq!(encode_compact(&truncated).target(), truncated);
        }
        assert_eq!(
            encode_compact(&hex_target(
                "0000000fffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
            )),
            CompactTarget(0x1d0fffff)
        );
        assert_eq!(
            encode_compact(&hex_target(
                "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
            )),
            CompactTarget(0x1d00ffff)
        );
    }

    #[test]
    fn test_block_proof() {
        // 0x207fffff is roughly 2^255: two hashes per block on average.
        assert_eq!(block_proof(CompactTarget(0x207fffff)), BigUint::from(2u32));
        assert_eq!(block_proof(CompactTarget(0x1d00ffff)), BigUint::from(0x1_0001_0001u64));
        assert!(block_proof(CompactTarget(0)).is_zero());
        assert!(block_proof(CompactTarget(0x04923456)).is_zero());
        assert!(block_proof(CompactTarget(0xff123456)).is_zero());
    }

    #[test]
    fn test_target_from_work_inverts_block_proof() {
        let bits = CompactTarget(0x1d00ffff);
        let work = block_proof(bits);
        assert_eq!(encode_compact(&target_from_work(&work)), bits);
    }

    #[test]
    fn test_debug_is_hex() {
        assert_eq!(format!("{:?}", CompactTarget(0x1d00ffff)), "CompactTarget(0x1d00ffff)");
        assert_eq!(CompactTarget(0x1d00ffff).to_string(), "0x1d00ffff");
    }
}
