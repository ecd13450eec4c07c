use nalgebra::Vector3;

/// A single point mass, as consumed by both integrators.
///
/// This mirrors the minimal `reb_particle` surface the original driver
/// exposes: mass, position, velocity, the accumulated acceleration (written
/// by the force kernel, read by the drift step), and a variational-particle
/// count that neither integrator in this crate acts on but must round-trip
/// unchanged (variational equations are an explicit non-goal, §1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub m: f64,
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
    pub variational_count: u32,
}

impl Particle {
    pub fn new(m: f64, pos: Vector3<f64>, vel: Vector3<f64>) -> Self {
        Self {
            m,
            pos,
            vel,
            acc: Vector3::zeros(),
            variational_count: 0,
        }
    }
}
