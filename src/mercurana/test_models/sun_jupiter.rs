use nalgebra::Vector3;

use crate::particle::Particle;
use crate::sim::Simulation;

/// Sun + Jupiter on a circular orbit, `G = 1`, masses in solar units. A
/// long-term energy-drift fixture (testable property 3, §8): a symplectic
/// scheme should show bounded oscillation in total energy rather than
/// secular drift.
pub fn sun_jupiter() -> Simulation {
    let g: f64 = 1.0;
    let m_sun = 1.0;
    let m_jupiter = 9.547e-4;
    let a = 5.2;
    let v = (g * (m_sun + m_jupiter) / a).sqrt();

    let sun = Particle::new(m_sun, Vector3::zeros(), Vector3::zeros());
    let jupiter = Particle::new(
        m_jupiter,
        Vector3::new(a, 0.0, 0.0),
        Vector3::new(0.0, v, 0.0),
    );
    let mut sim = Simulation::new(g, vec![sun, jupiter]);
    sim.dt = 0.01;
    sim
}

/// Total mechanical energy of `sim`, used to measure the drift bound of
/// testable property 3.
pub fn total_energy(sim: &Simulation) -> f64 {
    let mut energy = 0.0;
    for p in &sim.particles {
        energy += 0.5 * p.m * p.vel.norm_squared();
    }
    for i in 0..sim.particles.len() {
        for j in (i + 1)..sim.particles.len() {
            let r = (sim.particles[j].pos - sim.particles[i].pos).norm();
            energy -= sim.g * sim.particles[i].m * sim.particles[j].m / r;
        }
    }
    energy
}
