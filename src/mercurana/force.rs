//! Shell force kernel: pairwise gravity weighted by the switching function,
//! with an optional jerk term for the composition schemes that need it
//! (§4.5).

use nalgebra::Vector3;

use crate::mercurana::switching::{dldr_infinity, l_infinity};
use crate::sim::Simulation;

/// Three-term telescoping weight assigned to `shell` for a pair whose
/// combined critical radius is `dcrit[s][i].max(dcrit[s][j])` at boundary
/// `s`: the force contributed at the next-finer boundary is added, the force
/// already claimed by the next-coarser boundary is subtracted, and the
/// innermost/outermost shells drop the term that has no neighbor. Summed
/// over every shell this telescopes to exactly `1` for any separation
/// (§4.5, partition of unity).
fn shell_weight(d: f64, dcrit: &[Vec<f64>], shell: usize, n_max_shells: usize, i: usize, j: usize) -> f64 {
    let mut sum = 0.0;
    if shell > 0 {
        let inner = dcrit[shell][i].max(dcrit[shell][j]);
        let outer = dcrit[shell - 1][i].max(dcrit[shell - 1][j]);
        sum -= l_infinity(d, inner, outer);
    }
    if shell + 1 < n_max_shells {
        let inner = dcrit[shell + 1][i].max(dcrit[shell + 1][j]);
        let outer = dcrit[shell][i].max(dcrit[shell][j]);
        sum += l_infinity(d, inner, outer);
    } else {
        sum += 1.0;
    }
    sum
}

/// Radial derivative of [`shell_weight`], used by the jerk terms below.
fn shell_dweight_dr(d: f64, dcrit: &[Vec<f64>], shell: usize, n_max_shells: usize, i: usize, j: usize) -> f64 {
    let mut sum = 0.0;
    if shell > 0 {
        let inner = dcrit[shell][i].max(dcrit[shell][j]);
        let outer = dcrit[shell - 1][i].max(dcrit[shell - 1][j]);
        sum -= dldr_infinity(d, inner, outer);
    }
    if shell + 1 < n_max_shells {
        let inner = dcrit[shell + 1][i].max(dcrit[shell + 1][j]);
        let outer = dcrit[shell][i].max(dcrit[shell][j]);
        sum += dldr_infinity(d, inner, outer);
    }
    sum
}

/// Accumulates, into `acc` and (if `Some`) `jerk`, the force shell `shell`
/// is responsible for. `members` is that shell's own membership list
/// (particle indices whose predicted encounter depth is `shell` or deeper,
/// §3) in ascending order; only pairs drawn from it are visited, rather than
/// every particle on every shell's call. `dcrit` holds, per shell boundary,
/// each particle's critical radius (`dcrit[s][i]`); `n_max_shells` bounds how
/// many boundaries exist so the innermost/outermost shells can drop the
/// term that has no neighboring shell.
///
/// Polls `sim.sigint` between particle rows so a long-running force
/// evaluation can be cooperatively aborted (§5).
pub fn interaction_step(
    sim: &Simulation,
    members: &[usize],
    dcrit: &[Vec<f64>],
    shell: usize,
    n_max_shells: usize,
    acc: &mut [Vector3<f64>],
    mut jerk: Option<&mut [Vector3<f64>]>,
) -> bool {
    let n_active = sim.n_active_count();
    let testparticle_type = sim.testparticle_type;

    for a in acc.iter_mut() {
        *a = Vector3::zeros();
    }
    if let Some(j) = jerk.as_deref_mut() {
        for v in j.iter_mut() {
            *v = Vector3::zeros();
        }
    }

    for (idx, &i) in members.iter().enumerate() {
        if i >= n_active {
            break;
        }
        if sim.sigint_raised() {
            return false;
        }
        for &j in &members[idx + 1..] {
            let j_exerts_force = j < n_active || testparticle_type;
            let pi = &sim.particles[i];
            let pj = &sim.particles[j];
            let dx = pj.pos - pi.pos;
            let d = dx.norm();

            let weight = shell_weight(d, dcrit, shell, n_max_shells, i, j);
            if weight <= 0.0 {
                continue;
            }
            let d3 = d * d * d;
            let prefac = sim.g * weight / d3;

            // j always feels i's force (i is active); i feels j's force back
            // only when j actually exerts gravity.
            if j_exerts_force {
                acc[i] += dx * (prefac * pj.m);
            }
            acc[j] -= dx * (prefac * pi.m);

            if let Some(jerk) = jerk.as_deref_mut() {
                let dv = pj.vel - pi.vel;
                if dv.norm_squared() > 0.0 {
                    let dweight_dr = shell_dweight_dr(d, dcrit, shell, n_max_shells, i, j);
                    let vdotr = dx.dot(&dv) / d;
                    let dweight_dt = dweight_dr * vdotr;
                    let jerk_prefac = sim.g / d3 * (dweight_dt - 3.0 * weight * vdotr / d);
                    if j_exerts_force {
                        jerk[i] += dv * (prefac * pj.m) + dx * (jerk_prefac * pj.m);
                    }
                    jerk[j] -= dv * (prefac * pi.m) + dx * (jerk_prefac * pi.m);
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    fn two_body_sim(separation: f64) -> Simulation {
        let p0 = Particle::new(1.0, Vector3::zeros(), Vector3::zeros());
        let p1 = Particle::new(1.0, Vector3::new(separation, 0.0, 0.0), Vector3::zeros());
        Simulation::new(1.0, vec![p0, p1])
    }

    /// Testable property: for a pair well outside the outermost shell's
    /// window, the shell force kernel reproduces unweighted Newtonian
    /// gravity exactly.
    #[test]
    fn full_weight_beyond_outer_radius_matches_newtonian_force() {
        let sim = two_body_sim(10.0);
        let dcrit = vec![vec![2.0, 2.0], vec![1.0, 1.0]];
        let mut acc = vec![Vector3::zeros(); 2];
        interaction_step(&sim, &[0, 1], &dcrit, 0, 2, &mut acc, None);
        let expected = sim.g * 1.0 / (10.0 * 10.0);
        assert!((acc[0].x - expected).abs() < 1e-12);
        assert!((acc[1].x + expected).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_within_inner_radius_contributes_nothing() {
        let sim = two_body_sim(0.5);
        let dcrit = vec![vec![2.0, 2.0], vec![1.0, 1.0]];
        let mut acc = vec![Vector3::zeros(); 2];
        interaction_step(&sim, &[0, 1], &dcrit, 0, 2, &mut acc, None);
        assert_eq!(acc[0], Vector3::zeros());
        assert_eq!(acc[1], Vector3::zeros());
    }

    /// Testable property 5 (§8, partition of unity): summing this pair's
    /// weight across every shell boundary gives exactly 1, regardless of
    /// where the separation falls relative to the critical radii.
    #[test]
    fn shell_weights_telescope_to_one_across_all_shells() {
        let dcrit = vec![vec![4.0, 4.0], vec![2.0, 2.0], vec![1.0, 1.0]];
        for d in [0.1, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 20.0] {
            let total: f64 = (0..3).map(|s| shell_weight(d, &dcrit, s, 3, 0, 1)).sum();
            assert!((total - 1.0).abs() < 1e-12, "d = {d}, total = {total}");
        }
    }

    /// Testable property 4 (§8, shell containment): restricting the pair
    /// loop to a shell's own membership list means a particle absent from
    /// it contributes no force at that shell, even if it would otherwise be
    /// in range.
    #[test]
    fn members_outside_the_list_are_never_visited() {
        let sim = two_body_sim(0.5);
        let dcrit = vec![vec![2.0, 2.0], vec![1.0, 1.0]];
        let mut acc = vec![Vector3::zeros(); 2];
        // Shell 1's membership excludes particle 1: no pair is ever formed.
        interaction_step(&sim, &[0], &dcrit, 1, 2, &mut acc, None);
        assert_eq!(acc[0], Vector3::zeros());
        assert_eq!(acc[1], Vector3::zeros());
    }
}
