//! Close-encounter prediction and shell assignment (§4.4).

use nalgebra::Vector3;

use crate::sim::Simulation;

/// Predicts the squared minimum separation over the next `dt`, approximating
/// the relative trajectory as a straight line (zero relative acceleration)
/// and solving for the time of closest approach analytically. This mirrors
/// the reference's forward quadratic-minimization trick but drops the
/// acceleration term, since by the time two particles are close enough for
/// this estimate to matter the velocity term dominates (§4.4, open question).
///
/// `dt` may be negative (a reversed step): the search is always carried out
/// over the elapsed magnitude `|dt|`, with `dv` sign-corrected by `sign(dt)`
/// so the trajectory still runs forward in the direction of integration.
pub fn predict_rmin2(dx: Vector3<f64>, dv: Vector3<f64>, dt: f64) -> f64 {
    let dts = dt.signum();
    let dt = dt.abs();
    let dv_signed = dv * dts;
    let dv2 = dv_signed.dot(&dv_signed);
    if dv2 < 1.0e-300 {
        return dx.dot(&dx);
    }
    let t_star = (-dx.dot(&dv_signed) / dv2).clamp(0.0, dt);
    let r = dx + dv_signed * t_star;
    r.dot(&r)
}

/// For every interacting pair, predicts the minimum approach distance over
/// the step and assigns each particle the deepest shell any of its
/// encounters requires. `dcrit[i]` is particle `i`'s critical radius;
/// `shell_ro[l]` is shell `l`'s outer radius expressed as a multiple of
/// `max(dcrit_i, dcrit_j)`, increasing with `l`.
///
/// When `whsplitting` is set, index `0` (assumed central body) never
/// participates in encounter prediction: its interaction with every other
/// particle is always handled by the outermost (Keplerian) shell.
pub fn encounter_predict(
    sim: &Simulation,
    dcrit: &[f64],
    shell_ro: &[f64],
    dt: f64,
    whsplitting: bool,
) -> Vec<usize> {
    let n = sim.n();
    let n_active = sim.n_active_count();
    let mut shell_of = vec![0usize; n];

    let i_start = if whsplitting { 1 } else { 0 };
    for i in i_start..n_active {
        for j in (i + 1)..n {
            let pi = &sim.particles[i];
            let pj = &sim.particles[j];
            let dx = pj.pos - pi.pos;
            let dv = pj.vel - pi.vel;
            let rmin2 = predict_rmin2(dx, dv, dt);

            let combined = dcrit[i].max(dcrit[j]);
            let mut level = 0usize;
            for (l, &ro) in shell_ro.iter().enumerate().skip(1) {
                let radius = combined * ro;
                if rmin2 < radius * radius {
                    level = l;
                }
            }
            if level > shell_of[i] {
                shell_of[i] = level;
            }
            if level > shell_of[j] {
                shell_of[j] = level;
            }
        }
    }
    shell_of
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receding_pair_predicts_current_separation() {
        let dx = Vector3::new(1.0, 0.0, 0.0);
        let dv = Vector3::new(1.0, 0.0, 0.0);
        let rmin2 = predict_rmin2(dx, dv, 1.0);
        assert!((rmin2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn closing_pair_predicts_smaller_than_current_separation() {
        let dx = Vector3::new(1.0, 0.0, 0.0);
        let dv = Vector3::new(-1.0, 0.0, 0.0);
        let rmin2 = predict_rmin2(dx, dv, 1.0);
        assert!(rmin2 < 1.0);
        assert!(rmin2 >= 0.0);
    }

    #[test]
    fn approaching_pair_reaches_exact_contact_within_window() {
        let dx = Vector3::new(-1.0, 0.0, 0.0);
        let dv = Vector3::new(1.0, 0.0, 0.0);
        let rmin2 = predict_rmin2(dx, dv, 2.0);
        assert!(rmin2.abs() < 1e-12);
    }

    #[test]
    fn negative_dt_does_not_panic_and_matches_reversed_trajectory() {
        let dx = Vector3::new(-1.0, 0.0, 0.0);
        let dv = Vector3::new(1.0, 0.0, 0.0);
        let rmin2 = predict_rmin2(dx, dv, -2.0);
        assert!((rmin2 - 1.0).abs() < 1e-12);
    }
}
