//! Fixture simulations for MERCURANA integration tests.

pub mod figure_eight;
pub mod sun_jupiter;
