use thiserror::Error;

/// Fatal conditions surfaced from the integrators.
///
/// Recoverable conditions (stability rejection, error-too-large, non-convergence)
/// are not represented here: they are resolved internally by the step-size/order
/// control loop and only ever observed through [`crate::bs::Statistics`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegratorError {
    #[error("minimum step size reached at t = {t}, dt = {dt}")]
    MinStepReached { t: f64, dt: f64 },
    #[error("maximum step size reached at t = {t}, dt = {dt}")]
    MaxStepReached { t: f64, dt: f64 },
    #[error("NaN detected in error estimate at t = {t}")]
    NaNDetected { t: f64 },
    #[error("unsupported sub-step method: {method}")]
    UnsupportedMethod { method: u8 },
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = std::result::Result<T, IntegratorError>;
