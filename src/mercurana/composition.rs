//! Operator-splitting composition schemes for the drift/kick schedule
//! (§4.7).
//!
//! Higher-order schemes are built from the base leapfrog step by Yoshida's
//! triple-jump composition (Yoshida 1990, "Construction of higher order
//! symplectic integrators"), rather than hand-transcribing one coefficient
//! table per named scheme: `compose(coeffs, 2)` turns an order-`2n` scheme
//! into an order-`2n+2` one by running it three times with asymmetric
//! weights, which is how `LF4`, `LF6` and `LF8` relate to plain `LF` here.

/// One stage of a composition schedule: drift by `c` of the step, then kick
/// by `d` of the step. The final stage's `d` is always `0.0` (pure drift) so
/// that adjacent macro-steps can share their last/first kick (FSAL-style).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub drift: f64,
    pub kick: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EosScheme {
    Lf,
    Lf4,
    Lf6,
    Lf8,
    Lf4_2,
    Lf8_6_4,
    Pmlf4,
    Pmlf6,
    Plf7_6_4,
}

impl Default for EosScheme {
    fn default() -> Self {
        EosScheme::Lf
    }
}

fn base_lf() -> Vec<Stage> {
    vec![
        Stage { drift: 0.5, kick: 1.0 },
        Stage { drift: 0.5, kick: 0.0 },
    ]
}

/// `LF4_2`'s own 3-stage schedule: the same drift subdivision Yoshida's
/// triple-jump uses to raise leapfrog to 4th order, but with the two kicks
/// left uniform rather than Yoshida-weighted — a distinct, independently
/// normalized composition from `LF4`'s (§4.7).
fn lf4_2() -> Vec<Stage> {
    let w1 = 1.0 / (2.0 - 2f64.powf(1.0 / 3.0));
    let w0 = 1.0 - 2.0 * w1;
    vec![
        Stage { drift: w1, kick: 0.5 },
        Stage { drift: w0, kick: 0.5 },
        Stage { drift: w1, kick: 0.0 },
    ]
}

/// `LF8_6_4`'s own schedule, built from Yoshida's (1990) four published 6th-
/// order "solution A" kick weights rather than a further triple-jump of
/// `LF6` — 7 kicks in the palindrome `w1, w2, w3, w4, w3, w2, w1` separated
/// by the midpoint-averaged drifts between them, which is how `LF8_6_4`
/// mixes the order-6 and order-4 families its name refers to (§4.7).
fn lf8_6_4() -> Vec<Stage> {
    let w1 = 0.784513610477560;
    let w2 = 0.235573213359357;
    let w3 = -1.17767998417887;
    let w4 = 1.31518632068391;
    let kicks = [w1, w2, w3, w4, w3, w2, w1];
    let mut stages = Vec::with_capacity(kicks.len() + 1);
    let mut prev = 0.0;
    for &k in &kicks {
        stages.push(Stage {
            drift: (prev + k) / 2.0,
            kick: k,
        });
        prev = k;
    }
    stages.push(Stage {
        drift: prev / 2.0,
        kick: 0.0,
    });
    stages
}

/// Yoshida triple-jump: given an order-`2n` symmetric scheme, returns an
/// order-`2n+2` symmetric scheme by composing three copies at weights
/// `w1, w0, w1` with `w1 = 1 / (2 - 2^(1/(2n+1)))`, `w0 = 1 - 2*w1`.
fn triple_jump(inner: &[Stage], order: i32) -> Vec<Stage> {
    let w1 = 1.0 / (2.0 - 2f64.powf(1.0 / (order as f64 + 1.0)));
    let w0 = 1.0 - 2.0 * w1;
    let scaled = |w: f64| -> Vec<Stage> {
        inner
            .iter()
            .map(|s| Stage {
                drift: s.drift * w,
                kick: s.kick * w,
            })
            .collect()
    };
    let mut stages = Vec::new();
    stages.extend(scaled(w1));
    stages.extend(scaled(w0));
    stages.extend(scaled(w1));
    merge_adjacent_drifts(stages)
}

/// Adjacent stage boundaries both carrying a drift (no kick in between) are
/// folded into one, since a bare double-drift is equivalent to a single
/// drift of the summed length.
fn merge_adjacent_drifts(stages: Vec<Stage>) -> Vec<Stage> {
    let mut out: Vec<Stage> = Vec::with_capacity(stages.len());
    for s in stages {
        if s.kick == 0.0 {
            if let Some(last) = out.last_mut() {
                if last.kick == 0.0 {
                    last.drift += s.drift;
                    continue;
                }
            }
        }
        out.push(s);
    }
    out
}

/// The drift/kick schedule for one EOS scheme, normalized so the drift
/// fractions of a full macro-step sum to `1.0` and the kick fractions sum to
/// `1.0`.
pub fn schedule(scheme: EosScheme) -> Vec<Stage> {
    match scheme {
        EosScheme::Lf => base_lf(),
        EosScheme::Lf4 | EosScheme::Pmlf4 => triple_jump(&base_lf(), 2),
        EosScheme::Lf4_2 => lf4_2(),
        EosScheme::Lf6 | EosScheme::Pmlf6 => triple_jump(&triple_jump(&base_lf(), 2), 4),
        EosScheme::Lf8 => triple_jump(&triple_jump(&triple_jump(&base_lf(), 2), 4), 6),
        EosScheme::Lf8_6_4 => lf8_6_4(),
        EosScheme::Plf7_6_4 => triple_jump(&triple_jump(&base_lf(), 2), 4),
    }
}

/// Whether `scheme` requires a pre-processor/post-processor pair bracketing
/// the drift/kick schedule. `Pmlf4`/`Pmlf6`/`Plf7_6_4` use a modified
/// potential correction (a position-dependent kick applied once per
/// macro-step, before and after the schedule) to reach their nominal order
/// with fewer stages than the corresponding pure composition (§4.7).
pub fn needs_processors(scheme: EosScheme) -> bool {
    matches!(
        scheme,
        EosScheme::Pmlf4 | EosScheme::Pmlf6 | EosScheme::Plf7_6_4
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sums(stages: &[Stage]) -> (f64, f64) {
        (
            stages.iter().map(|s| s.drift).sum(),
            stages.iter().map(|s| s.kick).sum(),
        )
    }

    #[test]
    fn every_schedule_conserves_total_drift_and_kick() {
        for scheme in [
            EosScheme::Lf,
            EosScheme::Lf4,
            EosScheme::Lf6,
            EosScheme::Lf8,
            EosScheme::Lf4_2,
            EosScheme::Lf8_6_4,
            EosScheme::Pmlf4,
            EosScheme::Pmlf6,
            EosScheme::Plf7_6_4,
        ] {
            let (drift, kick) = sums(&schedule(scheme));
            assert!((drift - 1.0).abs() < 1e-9, "{scheme:?} drift = {drift}");
            assert!((kick - 1.0).abs() < 1e-9, "{scheme:?} kick = {kick}");
        }
    }

    #[test]
    fn lf4_2_and_lf8_6_4_are_not_aliases_of_lf4_and_lf8() {
        assert_ne!(schedule(EosScheme::Lf4_2), schedule(EosScheme::Lf4));
        assert_ne!(schedule(EosScheme::Lf8_6_4), schedule(EosScheme::Lf8));
    }

    #[test]
    fn lf4_schedule_is_symmetric() {
        let stages = schedule(EosScheme::Lf4);
        let drifts: Vec<f64> = stages.iter().map(|s| s.drift).collect();
        let reversed: Vec<f64> = drifts.iter().rev().cloned().collect();
        for (a, b) in drifts.iter().zip(reversed.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
