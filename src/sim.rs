use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::particle::Particle;

/// Gravity routine selector. MERCURANA always forces this to `None` on
/// `part1` (§4.7/§6); BS does not read it at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GravityKind {
    #[default]
    None,
    Basic,
    Other,
}

/// Collision search selector. MERCURANA only supports `None`/`Direct`; any
/// other value is a [`ConfigWarning`](crate::mercurana::ConfigWarning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionKind {
    #[default]
    None,
    Direct,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationStatus {
    #[default]
    Running,
    RunningLastStep,
    Finished,
}

/// The minimal slice of the top-level simulation driver that both
/// integrators consume. Particle storage, gravity routines, and the rest of
/// the driver are out of scope (§1) and are represented here only by the
/// fields the integrators actually read or write.
pub struct Simulation {
    pub t: f64,
    pub dt: f64,
    pub dt_last_done: f64,
    pub status: SimulationStatus,
    pub gravity: GravityKind,
    pub collision: CollisionKind,
    pub g: f64,
    pub particles: Vec<Particle>,
    /// Number of active (massive, force-exerting) particles. `None` means
    /// all particles are active.
    pub n_active: Option<usize>,
    /// Whether passive (test) particles also exert force on active ones.
    pub testparticle_type: bool,
    /// Cooperative abort flag polled by the shell force kernel between
    /// pair-loop iterations (§5).
    pub sigint: Arc<AtomicBool>,
}

impl Simulation {
    pub fn new(g: f64, particles: Vec<Particle>) -> Self {
        Self {
            t: 0.0,
            dt: 0.01,
            dt_last_done: 0.0,
            status: SimulationStatus::Running,
            gravity: GravityKind::None,
            collision: CollisionKind::None,
            g,
            particles,
            n_active: None,
            testparticle_type: false,
            sigint: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn n(&self) -> usize {
        self.particles.len()
    }

    pub fn n_active_count(&self) -> usize {
        self.n_active.unwrap_or_else(|| self.particles.len())
    }

    pub fn sigint_raised(&self) -> bool {
        self.sigint.load(Ordering::Relaxed)
    }
}
