use crate::bs::BsIntegrator;
use crate::ode::OdeEquations;

/// Classical seven-body Pleiades problem: planar, unequal masses, several
/// near-collisions within the first two time units. A standard stiff-ODE
/// stress test for variable-order methods (testable scenario S2, §8).
struct Pleiades {
    masses: [f64; 7],
}

impl OdeEquations for Pleiades {
    fn derivatives(&mut self, y: &[f64], _t: f64, y_dot: &mut [f64]) {
        let n = self.masses.len();
        for i in 0..n {
            y_dot[2 * n + i] = 0.0;
            y_dot[3 * n + i] = 0.0;
        }
        for i in 0..n {
            y_dot[i] = y[2 * n + i];
            y_dot[n + i] = y[3 * n + i];
        }
        for i in 0..n {
            let (xi, yi) = (y[i], y[n + i]);
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = y[j] - xi;
                let dy = y[n + j] - yi;
                let r2 = dx * dx + dy * dy;
                let r3 = r2 * r2.sqrt();
                y_dot[2 * n + i] += self.masses[j] * dx / r3;
                y_dot[3 * n + i] += self.masses[j] * dy / r3;
            }
        }
    }
}

/// Registers the standard Pleiades initial conditions (Hairer, Norsett &
/// Wanner, "Solving Ordinary Differential Equations I", §II.10) and returns
/// the ODE handle. State layout: `[x_0..x_6, y_0..y_6, vx_0..vx_6, vy_0..vy_6]`.
pub fn pleiades_seven_body(bs: &mut BsIntegrator) -> usize {
    let masses = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
    let x0 = [3.0, 3.0, -1.0, -3.0, 2.0, -2.0, 2.0];
    let y0 = [3.0, -3.0, 2.0, 0.0, 0.0, -4.0, 4.0];
    let vx0 = [0.0, 0.0, 0.0, 0.0, 0.0, 1.75, -1.5];
    let vy0 = [0.0, 0.0, 0.0, -1.25, 1.0, 0.0, 0.0];

    let handle = bs.add_ode(28, Box::new(Pleiades { masses }));
    let state = bs.ode_mut(handle);
    for i in 0..7 {
        state.y[i] = x0[i];
        state.y[7 + i] = y0[i];
        state.y[14 + i] = vx0[i];
        state.y[21 + i] = vy0[i];
    }
    handle
}
