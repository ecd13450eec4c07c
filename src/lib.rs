//! Adaptive extrapolation and multi-shell symplectic integrators for
//! N-body / ODE systems.
//!
//! Two integrators, sharing the [`Simulation`]/[`Particle`] data model and
//! [`IntegratorError`] error type but otherwise independent:
//!
//! - [`bs`] — Gragg-Bulirsch-Stoer extrapolation with adaptive step/order
//!   control, for systems without close encounters.
//! - [`mercurana`] — multi-shell hybrid symplectic integration with
//!   encounter prediction and C-infinity switching, for systems that do.

pub mod bs;
pub mod error;
pub mod mercurana;
pub mod ode;
pub mod particle;
pub mod sim;

pub use error::{IntegratorError, Result};
pub use particle::Particle;
pub use sim::{CollisionKind, GravityKind, Simulation, SimulationStatus};
