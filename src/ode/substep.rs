//! `tryStep` sub-step engines (§4.1): modified midpoint and drift-kick leapfrog.

use super::OdeState;

/// Maximum tableau column for which the midpoint stability check runs.
const MAX_ITER: usize = 2;
/// Maximum sub-step index within a column for which the stability check runs.
const MAX_CHECKS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstepMethod {
    Leapfrog = 0,
    Midpoint = 1,
}

impl TryFrom<u8> for SubstepMethod {
    type Error = crate::error::IntegratorError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SubstepMethod::Leapfrog),
            1 => Ok(SubstepMethod::Midpoint),
            other => Err(crate::error::IntegratorError::UnsupportedMethod { method: other }),
        }
    }
}

/// Run one trial step of `n` sub-steps of size `step/n` starting at `t0`, for every
/// ODE in `states`. Returns `true` on normal completion; `false` when the in-flight
/// stability test (midpoint only) rejects the attempt.
///
/// On success each `states[s].y1` holds the n-fold composite starting from
/// `states[s].y`, and `states[s].y_dot` holds the derivative at the last sub-step
/// evaluation (§4.1).
pub fn try_step(
    states: &mut [OdeState],
    k: usize,
    n: usize,
    t0: f64,
    step: f64,
    method: SubstepMethod,
) -> bool {
    match method {
        SubstepMethod::Leapfrog => {
            try_step_leapfrog(states, n, t0, step);
            true
        }
        SubstepMethod::Midpoint => try_step_midpoint(states, k, n, t0, step),
    }
}

fn try_step_midpoint(states: &mut [OdeState], k: usize, n: usize, t0: f64, step: f64) -> bool {
    let sub_step = step / n as f64;
    let mut t = t0;

    // first sub-step
    t += sub_step;
    for state in states.iter_mut() {
        for i in 0..state.length {
            state.y1[i] = state.y[i] + sub_step * state.y0_dot[i];
        }
    }
    for state in states.iter_mut() {
        let (y1, y_dot) = (&state.y1, &mut state.y_dot);
        let y1 = y1.clone();
        state.equations.derivatives(&y1, t, y_dot);
    }
    for state in states.iter_mut() {
        state.y_tmp.copy_from_slice(&state.y);
    }

    // remaining n-1 sub-steps (note: n sub-steps total, not 2n as in Hairer/Wanner eq 9.13)
    for j in 1..n {
        t += sub_step;
        for state in states.iter_mut() {
            for i in 0..state.length {
                let middle = state.y1[i];
                state.y1[i] = state.y_tmp[i] + 2.0 * sub_step * state.y_dot[i];
                state.y_tmp[i] = middle;
            }
        }
        for state in states.iter_mut() {
            let y1 = state.y1.clone();
            state.equations.derivatives(&y1, t, &mut state.y_dot);
        }

        if j <= MAX_CHECKS && k < MAX_ITER {
            let mut initial_norm = 0.0;
            let mut delta_norm = 0.0;
            for state in states.iter() {
                for l in 0..state.length {
                    let ratio = state.y0_dot[l] / state.scale[l];
                    initial_norm += ratio * ratio;
                    let dratio = (state.y_dot[l] - state.y0_dot[l]) / state.scale[l];
                    delta_norm += dratio * dratio;
                }
            }
            if delta_norm > 4.0 * initial_norm.max(1.0e-15) {
                return false;
            }
        }
    }

    // correction of the last substep (at t0 + step), Hairer/Wanner eq 9.13c
    for state in states.iter_mut() {
        for i in 0..state.length {
            state.y1[i] = 0.5 * (state.y_tmp[i] + state.y1[i] + sub_step * state.y_dot[i]);
        }
    }
    true
}

/// Drift-kick leapfrog over a flat array of 6-tuples: position triple (indices
/// `i % 6 < 3`) followed by velocity triple (`i % 6 >= 3`). The stability check
/// documented for midpoint is not evaluated here (§4.1, open question i).
fn try_step_leapfrog(states: &mut [OdeState], n: usize, t0: f64, step: f64) {
    let sub_step = step / n as f64;
    let mut t = t0;

    // first sub-step: half-drift, evaluate, full-kick
    for state in states.iter_mut() {
        for i in 0..state.length {
            if i % 6 < 3 {
                state.y1[i] = state.y[i] + 0.5 * sub_step * state.y[i + 3];
            }
        }
    }
    t += 0.5 * sub_step;
    for state in states.iter_mut() {
        let y1 = state.y1.clone();
        state.equations.derivatives(&y1, t, &mut state.y_dot);
    }
    for state in states.iter_mut() {
        for i in 0..state.length {
            if i % 6 >= 3 {
                state.y1[i] = state.y[i] + sub_step * state.y_dot[i];
            }
        }
    }

    // remaining sub-steps: full-drift, evaluate, full-kick
    for _ in 1..n {
        t += sub_step;
        for state in states.iter_mut() {
            for i in 0..state.length {
                if i % 6 < 3 {
                    state.y1[i] += sub_step * state.y1[i + 3];
                }
            }
        }
        for state in states.iter_mut() {
            let y1 = state.y1.clone();
            state.equations.derivatives(&y1, t, &mut state.y_dot);
        }
        for state in states.iter_mut() {
            for i in 0..state.length {
                if i % 6 >= 3 {
                    state.y1[i] += sub_step * state.y_dot[i];
                }
            }
        }
    }

    // final half-drift
    for state in states.iter_mut() {
        for i in 0..state.length {
            if i % 6 < 3 {
                state.y1[i] += 0.5 * sub_step * state.y1[i + 3];
            }
        }
    }
}
