//! C∞ switching functions for force partitioning between shells (§4.5).
//!
//! `l_infinity` is Rebound's smoothstep-like bump function built from
//! `f(x) = exp(-1/x)` for `x > 0`, `0` otherwise; it is exactly `0` for
//! `d <= ri`, exactly `1` for `d >= ro`, and `C^infinity` in between.

fn f(x: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        (-1.0 / x).exp()
    }
}

fn dfdy(x: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        f(x) / (x * x)
    }
}

/// Fraction of the force, in `[0, 1]`, assigned to the *outer* (coarser)
/// shell at separation `d` given inner/outer transition radii `ri < ro`.
pub fn l_infinity(d: f64, ri: f64, ro: f64) -> f64 {
    if d <= ri {
        0.0
    } else if d >= ro {
        1.0
    } else {
        let x = (d - ri) / (ro - ri);
        let fx = f(x);
        fx / (fx + f(1.0 - x))
    }
}

/// `d/dr` of [`l_infinity`], used by the jerk (force-derivative) terms of
/// the shell force kernel (§4.5).
pub fn dldr_infinity(d: f64, ri: f64, ro: f64) -> f64 {
    if d <= ri || d >= ro {
        0.0
    } else {
        let w = ro - ri;
        let x = (d - ri) / w;
        let fx = f(x);
        let f1x = f(1.0 - x);
        let denom = fx + f1x;
        let numer = dfdy(x) * f1x + fx * dfdy(1.0 - x);
        numer / (denom * denom * w)
    }
}

/// Newton's-method cube root, matching the original's bespoke `sqrt3`
/// rather than `f64::cbrt` (needed for the `dcrit` closed-form in
/// [`crate::mercurana::predictor`] to stay bit-for-bit with the reference
/// at the precision the original cared about; `f64::cbrt` would be an
/// equally valid but unverified substitute).
pub fn sqrt3(n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let sign = if n < 0.0 { -1.0 } else { 1.0 };
    let n = n.abs();
    let mut x = n;
    for _ in 0..200 {
        let x_new = (2.0 * x + n / (x * x)) / 3.0;
        if (x_new - x).abs() < 1e-15 * x_new.abs().max(1e-300) {
            x = x_new;
            break;
        }
        x = x_new;
    }
    sign * x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l_infinity_is_zero_and_one_at_boundaries() {
        assert_eq!(l_infinity(0.5, 1.0, 2.0), 0.0);
        assert_eq!(l_infinity(2.0, 1.0, 2.0), 1.0);
        assert_eq!(l_infinity(2.5, 1.0, 2.0), 1.0);
    }

    #[test]
    fn l_infinity_midpoint_is_one_half_by_symmetry() {
        let mid = l_infinity(1.5, 1.0, 2.0);
        assert!((mid - 0.5).abs() < 1e-12, "mid = {mid}");
    }

    #[test]
    fn l_infinity_is_monotone_on_transition_band() {
        let mut prev = 0.0;
        for i in 1..100 {
            let d = 1.0 + i as f64 / 100.0;
            let v = l_infinity(d, 1.0, 2.0);
            assert!(v >= prev, "l_infinity must be non-decreasing");
            prev = v;
        }
    }

    #[test]
    fn sqrt3_inverts_cube() {
        for n in [1.0, 8.0, 27.0, 0.125, -8.0] {
            let r = sqrt3(n);
            assert!((r * r * r - n).abs() < 1e-9, "sqrt3({n}) = {r}");
        }
    }
}
