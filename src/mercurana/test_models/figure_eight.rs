use nalgebra::Vector3;

use crate::particle::Particle;
use crate::sim::Simulation;

/// Chenciner-Montgomery figure-eight three-body choreography: equal masses,
/// periodic, and passes through a close but non-colliding mutual approach
/// each period — a natural fixture for the encounter-prediction and shell
/// recursion path (testable scenario S3, §8).
pub fn figure_eight() -> Simulation {
    let g = 1.0;
    let m = 1.0;

    let p1 = Particle::new(
        m,
        Vector3::new(0.97000436, -0.24308753, 0.0),
        Vector3::new(0.466203685, 0.43236573, 0.0),
    );
    let p2 = Particle::new(
        m,
        Vector3::new(-0.97000436, 0.24308753, 0.0),
        Vector3::new(0.466203685, 0.43236573, 0.0),
    );
    let p3 = Particle::new(
        m,
        Vector3::zeros(),
        Vector3::new(-0.93240737, -0.86473146, 0.0),
    );

    let mut sim = Simulation::new(g, vec![p1, p2, p3]);
    sim.dt = 1.0e-3;
    sim
}
