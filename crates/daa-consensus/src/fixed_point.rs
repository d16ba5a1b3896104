//! Fixed-point `2^x` for fractional `x`.

/// One, in 16.16 fixed point.
pub const FIXED_ONE: u32 = 1 << 16;

/// Approximate `65536 * 2^(frac / 65536)`.
///
/// Cubic polynomial with coefficients scaled by 2^48, rounded to nearest.
/// Relative error against the true value stays below 0.013% over the whole
/// input range. The result lies in `[65536, 131071]`.
pub fn exp2_fraction(frac: u16) -> u32 {
    let f = u64::from(frac);
    // Largest intermediate is below 2^64 for every u16 input.
    let poly = 195_766_423_245_049u64 * f
        + 971_821_376u64 * f * f
        + 5_127u64 * f * f * f
        + (1u64 << 47);
    FIXED_ONE + (poly >> 48) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp2_endpoints() {
        assert_eq!(exp2_fraction(0), 65536);
        assert_eq!(exp2_fraction(32768), 92674);
        assert_eq!(exp2_fraction(u16::MAX), 131071);
    }

    #[test]
    fn test_exp2_error_bound() {
        for frac in 0..=u16::MAX {
            let exact = 65536.0 * 2f64.powf(f64::from(frac) / 65536.0);
            let approx = f64::from(exp2_fraction(frac));
            let rel = (approx - exact).abs() / exact;
            assert!(rel < 0.00013, "frac {} error {}", frac, rel);
        }
    }

    #[test]
    fn test_exp2_monotonic() {
        let mut last = exp2_fraction(0);
        for frac in 1..=u16::MAX {
            let next = exp2_fraction(frac);
            assert!(next >= last, "frac {}", frac);
            last = next;
        }
    }
}
