//! Fixture ODEs for BS unit tests, colocated the way
//! `diffsol::ode_solver::test_models` keeps `robertson.rs` /
//! `exponential_decay_with_algebraic.rs` next to the solver they exercise.

pub mod harmonic_oscillator;
pub mod kepler;
pub mod pleiades;
pub mod unstable_oscillator;
