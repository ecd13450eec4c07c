//! Neville-style polynomial extrapolation in (1/n)² of the tableau rows (§4.2).

use super::OdeState;

/// Extrapolate `state.tableau[0..=k]` in place and write the combined estimate
/// into `state.y1`. `coeff[j] = 1/seq[j]^2`. On exit `state.c` holds the
/// last-column error contribution used by the BS error metric.
pub fn extrapolate(state: &mut OdeState, coeff: &[f64], k: usize) {
    let length = state.length;
    for j in 0..k {
        let xi = coeff[k - j - 1];
        let xim1 = coeff[k];
        let fac_c = xi / (xi - xim1);
        let fac_d = xim1 / (xi - xim1);
        for i in 0..length {
            let cd = state.c[i] - state.tableau[k - j - 1][i];
            state.c[i] = fac_c * cd;
            state.tableau[k - j - 1][i] = fac_d * cd;
        }
    }
    state.y1.copy_from_slice(&state.tableau[0]);
    for j in 1..=k {
        for i in 0..length {
            state.y1[i] += state.tableau[j][i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode::OdeEquations;

    struct NoOp;
    impl OdeEquations for NoOp {
        fn derivatives(&mut self, _y: &[f64], _t: f64, _y_dot: &mut [f64]) {}
    }

    /// Feeding synthetic tableau rows `D[k][i] = g(1/seq[k]^2)` for a smooth g,
    /// the extrapolator should recover `g(0)` to machine precision for the
    /// last usable column (testable property 6, §8).
    #[test]
    fn recovers_smooth_function_at_zero() {
        let sequence_length = 9;
        let seq: Vec<usize> = (0..sequence_length).map(|k| 4 * k + 2).collect();
        let coeff: Vec<f64> = seq.iter().map(|&n| 1.0 / (n as f64 * n as f64)).collect();

        // g(x) = 1 + 2x + 3x^2, so g(0) = 1 exactly recoverable from a degree-2
        // polynomial fit, which a tableau of this depth reproduces exactly.
        let g = |x: f64| 1.0 + 2.0 * x + 3.0 * x * x;

        let mut state = OdeState::new(1, sequence_length, Box::new(NoOp));
        for k in 0..sequence_length {
            state.tableau[k][0] = g(coeff[k]);
        }
        state.c[0] = state.tableau[0][0];

        for k in 1..sequence_length {
            state.c[0] = state.tableau[k][0];
            extrapolate(&mut state, &coeff, k);
        }

        assert!(
            (state.y1[0] - g(0.0)).abs() < 1e-9,
            "expected {}, got {}",
            g(0.0),
            state.y1[0]
        );
    }
}
