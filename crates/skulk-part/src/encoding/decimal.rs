//! Fixed-point decimal conversion for block values.
//!
//! A block stores its values as integer mantissas sharing one power-of-ten
//! scale exponent: `value = mantissa * 10^scale`. Integers compress far better
//! than raw IEEE 754 bits under the delta encoders in [`super::marshal`].
//!
//! Regular mantissas stay strictly below `10^18` in magnitude, which leaves the
//! extreme `i64` values free for the non-finite sentinels below. Sentinels are
//! not affected by the scale.

/// Mantissa sentinel for `NaN`.
pub const V_NAN: i64 = i64::MIN;

/// Mantissa sentinel for `+Inf`.
pub const V_INF_POS: i64 = i64::MAX;

/// Mantissa sentinel for `-Inf`.
pub const V_INF_NEG: i64 = i64::MIN + 1;

/// Largest mantissa magnitude a finite value may use.
const MAX_MANTISSA: i64 = 999_999_999_999_999_999;

/// Exact powers of ten representable as `f64`.
const POW10_F64: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Mantissas below this magnitude convert to `f64` exactly.
const MAX_EXACT_F64_INT: i64 = 1 << 53;

/// Returns true if `v` is one of the non-finite sentinels.
#[inline]
pub fn is_special(v: i64) -> bool {
    v == V_NAN || v == V_INF_POS || v == V_INF_NEG
}

/// Converts `f` into a normalized `(mantissa, exponent)` pair.
///
/// The mantissa carries no trailing decimal zeros, and holds the shortest
/// digit string that round-trips back to `f`.
pub fn from_float(f: f64) -> (i64, i16) {
    if f.is_nan() {
        return (V_NAN, 0);
    }
    if f.is_infinite() {
        return (if f > 0.0 { V_INF_POS } else { V_INF_NEG }, 0);
    }
    if f == 0.0 {
        return (0, 0);
    }

    if f.fract() == 0.0 && f.abs() <= MAX_MANTISSA as f64 {
        return normalize(f as i64, 0);
    }

    // Shortest round-trip digits, e.g. "-0.003", "123456.789" or "1.2345e-7".
    let mut buf = ryu::Buffer::new();
    let repr = buf.format_finite(f);
    let (digits, exp) = match repr.split_once('e') {
        Some((digits, exp)) => (digits, exp.parse::<i32>().unwrap_or(0)),
        None => (repr, 0),
    };

    // Zero runs are deferred so trailing zeros never reach the mantissa.
    let mut mantissa: i64 = 0;
    let mut zeros: u32 = 0;
    let mut frac_digits: i32 = 0;
    let mut seen_dot = false;
    for c in digits.bytes() {
        match c {
            b'.' => seen_dot = true,
            b'0'..=b'9' => {
                if c == b'0' {
                    zeros += 1;
                } else {
                    mantissa = mantissa * pow10_i64(zeros + 1) + i64::from(c - b'0');
                    zeros = 0;
                }
                if seen_dot {
                    frac_digits += 1;
                }
            }
            _ => {}
        }
    }
    if f < 0.0 {
        mantissa = -mantissa;
    }

    let exp = (exp - frac_digits + zeros as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    (mantissa, exp)
}

/// Converts a `(mantissa, exponent)` pair back to `f64`.
pub fn to_float(mantissa: i64, exp: i16) -> f64 {
    match mantissa {
        V_NAN => return f64::NAN,
        V_INF_POS => return f64::INFINITY,
        V_INF_NEG => return f64::NEG_INFINITY,
        0 => return 0.0,
        _ => {}
    }
    if exp == 0 {
        return mantissa as f64;
    }

    // Both operands exact, so the single rounding step yields the nearest f64.
    if mantissa.abs() < MAX_EXACT_F64_INT {
        let m = mantissa as f64;
        if exp > 0 && (exp as usize) < POW10_F64.len() {
            return m * POW10_F64[exp as usize];
        }
        let neg = exp.unsigned_abs() as usize;
        if exp < 0 && neg < POW10_F64.len() {
            return m / POW10_F64[neg];
        }
    }

    format!("{}e{}", mantissa, exp)
        .parse()
        .unwrap_or(f64::NAN)
}

/// Appends the decimal mantissas of `src` to `dst` and returns their shared
/// scale exponent.
///
/// The exponent is the smallest per-value exponent, so no digit is lost,
/// unless upscaling some mantissa to it would exceed the mantissa limit. Then
/// the smallest exponent that keeps every mantissa in range is used and the
/// finer values are rounded to it.
///
/// `scratch` holds the per-value `(mantissa, exponent)` pairs between the two
/// passes. It is cleared first and keeps its allocation for the next call.
pub fn append_floats_to_decimal(
    dst: &mut Vec<i64>,
    scratch: &mut Vec<(i64, i16)>,
    src: &[f64],
) -> i16 {
    scratch.clear();
    scratch.extend(src.iter().map(|&f| from_float(f)));

    let mut min_exp = i16::MAX;
    let mut lower_bound = i16::MIN;
    for &(m, e) in scratch.iter() {
        if m == 0 || is_special(m) {
            continue;
        }
        min_exp = min_exp.min(e);
        lower_bound = lower_bound.max(e.saturating_sub(upscale_headroom(m)));
    }

    if min_exp == i16::MAX {
        // Only zeros and non-finite values.
        dst.extend(scratch.iter().map(|&(m, _)| m));
        return 0;
    }

    let scale = min_exp.max(lower_bound);
    dst.extend(scratch.iter().map(|&(m, e)| {
        if m == 0 || is_special(m) {
            m
        } else if e >= scale {
            m * pow10_i64((e - scale) as u32)
        } else {
            round_div_pow10(m, (scale as i32 - e as i32) as u32)
        }
    }));
    scale
}

/// Appends the floats encoded by `src` at `scale` to `dst`.
pub fn append_decimal_to_floats(dst: &mut Vec<f64>, src: &[i64], scale: i16) {
    dst.reserve(src.len());
    for &m in src {
        dst.push(to_float(m, scale));
    }
}

fn normalize(mut mantissa: i64, mut exp: i16) -> (i64, i16) {
    while mantissa != 0 && mantissa % 10 == 0 && exp < i16::MAX {
        mantissa /= 10;
        exp += 1;
    }
    (mantissa, exp)
}

/// Number of times `m` can be multiplied by ten without leaving the mantissa range.
fn upscale_headroom(m: i64) -> i16 {
    let mut m = m.abs();
    let mut n = 0;
    while m <= MAX_MANTISSA / 10 {
        m *= 10;
        n += 1;
    }
    n
}

#[inline]
fn pow10_i64(n: u32) -> i64 {
    10i64.pow(n)
}

fn round_div_pow10(m: i64, n: u32) -> i64 {
    if n > 18 {
        return 0;
    }
    let d = pow10_i64(n);
    let q = m / d;
    let r = m % d;
    if r.abs() * 2 >= d {
        q + m.signum()
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_float_integers() {
        assert_eq!(from_float(0.0), (0, 0));
        assert_eq!(from_float(42.0), (42, 0));
        assert_eq!(from_float(1200.0), (12, 2));
        assert_eq!(from_float(-7.0), (-7, 0));
    }

    #[test]
    fn test_from_float_fractions() {
        assert_eq!(from_float(0.1), (1, -1));
        assert_eq!(from_float(1.25), (125, -2));
        assert_eq!(from_float(-0.003), (-3, -3));
    }

    #[test]
    fn test_float_roundtrip_exact() {
        let values = [
            0.1,
            1.25,
            -3.5e-9,
            123456.789,
            1e300,
            -2.2250738585072014e-308,
            std::f64::consts::PI,
            9_007_199_254_740_992.0,
        ];
        for &v in &values {
            let (m, e) = from_float(v);
            assert_eq!(to_float(m, e), v, "roundtrip of {}", v);
        }
    }

    #[test]
    fn test_from_float_notations() {
        // Plain, leading-zero and exponent forms of the shortest digits.
        assert_eq!(from_float(123456.789), (123456789, -3));
        assert_eq!(from_float(0.000123), (123, -6));
        assert_eq!(from_float(-1.2345e-7), (-12345, -11));
        assert_eq!(from_float(2.5e-300), (25, -301));
        assert_eq!(from_float(1e300), (1, 300));
        assert_eq!(from_float(1.5e20), (15, 19));
    }

    #[test]
    fn test_scratch_is_reused() {
        let mut scratch = Vec::with_capacity(64);
        let ptr = scratch.as_ptr();
        let mut dst = Vec::new();
        for _ in 0..3 {
            dst.clear();
            append_floats_to_decimal(&mut dst, &mut scratch, &[0.5, 1.25, -3.0]);
            assert_eq!(dst, vec![50, 125, -300]);
        }
        assert_eq!(scratch.len(), 3);
        assert_eq!(scratch.as_ptr(), ptr);
    }

    #[test]
    fn test_special_values() {
        assert_eq!(from_float(f64::INFINITY).0, V_INF_POS);
        assert_eq!(from_float(f64::NEG_INFINITY).0, V_INF_NEG);
        assert_eq!(from_float(f64::NAN).0, V_NAN);
        assert!(to_float(V_NAN, 5).is_nan());
        assert_eq!(to_float(V_INF_POS, -3), f64::INFINITY);
        assert_eq!(to_float(V_INF_NEG, 7), f64::NEG_INFINITY);
    }

    #[test]
    fn test_shared_scale_uses_smallest_exponent() {
        let mut dst = Vec::new();
        let scale = append_floats_to_decimal(&mut dst, &mut Vec::new(), &[1.5, 2.0, 0.25]);
        assert_eq!(scale, -2);
        assert_eq!(dst, vec![150, 200, 25]);

        let mut floats = Vec::new();
        append_decimal_to_floats(&mut floats, &dst, scale);
        assert_eq!(floats, vec![1.5, 2.0, 0.25]);
    }

    #[test]
    fn test_shared_scale_appends() {
        let mut dst = vec![7];
        let mut scratch = vec![(1, 1)];
        let scale = append_floats_to_decimal(&mut dst, &mut scratch, &[100.0, 300.0]);
        assert_eq!(scale, 2);
        assert_eq!(dst, vec![7, 1, 3]);
        assert_eq!(scratch, vec![(1, 2), (3, 2)]);
    }

    #[test]
    fn test_zeros_and_specials_only() {
        let mut dst = Vec::new();
        let scale =
            append_floats_to_decimal(&mut dst, &mut Vec::new(), &[0.0, f64::NAN, f64::INFINITY]);
        assert_eq!(scale, 0);
        assert_eq!(dst, vec![0, V_NAN, V_INF_POS]);
    }

    #[test]
    fn test_wide_dynamic_range_stays_in_bounds() {
        let src = [1e15, 1e-10, 3.0];
        let mut dst = Vec::new();
        let scale = append_floats_to_decimal(&mut dst, &mut Vec::new(), &src);
        assert!(dst.iter().all(|m| m.abs() <= MAX_MANTISSA));

        let mut floats = Vec::new();
        append_decimal_to_floats(&mut floats, &dst, scale);
        assert_eq!(floats[0], 1e15);
        assert_eq!(floats[2], 3.0);
        // The tiny value is rounded to the coarser scale.
        assert!(floats[1].abs() < 1e-2);
    }
}
