//! Per-ODE state and the capability contract BS integrates against.
//!
//! Generalizes `diffsol`'s `Callable`/`Op` trait family (`callable::ode::BdfCallable`,
//! `callable::unit::UnitCallable`) down to the single derivatives+scale capability
//! BS actually needs: no Jacobian, no mass matrix, since the sub-step engines here
//! are explicit (§3, §9).

pub mod extrapolate;
pub mod substep;
pub mod test_models;

/// The capability an ODE must provide to be integrated by [`crate::bs::BsIntegrator`].
///
/// `derivatives` must be a pure function of `y` and `t` up to whatever state the
/// implementation closes over (the "opaque reference to owning domain" of §3) —
/// for the built-in N-body equation that's a handle to the particle array it mirrors.
pub trait OdeEquations {
    /// Evaluate `y_dot = f(y, t)`.
    fn derivatives(&mut self, y: &[f64], t: f64, y_dot: &mut [f64]);

    /// Populate `scale` from `y_a` and `y_b` (the two most recent solution estimates).
    /// Returns `false` to request the BS controller's default
    /// `scale[i] = abs_tol + rel_tol * max(|y_a[i]|, |y_b[i]|)`.
    fn scale(&mut self, _y_a: &[f64], _y_b: &[f64], _scale: &mut [f64]) -> bool {
        false
    }
}

/// One ODE's working buffers and extrapolation tableau (§3).
///
/// `y` is the accepted solution and is read-only during a step; `y1` is the
/// candidate under construction; the two are swapped on acceptance
/// ([`crate::bs::BsIntegrator::step`]). All buffers are allocated once, at
/// [`OdeState::new`], and never reallocated for the lifetime of the state.
pub struct OdeState {
    pub length: usize,
    pub y: Vec<f64>,
    pub y1: Vec<f64>,
    pub y0_dot: Vec<f64>,
    pub y_dot: Vec<f64>,
    pub y_tmp: Vec<f64>,
    pub c: Vec<f64>,
    pub scale: Vec<f64>,
    /// Extrapolation tableau, `tableau[k][i]`, `sequence_length` rows.
    pub tableau: Vec<Vec<f64>>,
    pub equations: Box<dyn OdeEquations>,
}

impl OdeState {
    pub fn new(length: usize, sequence_length: usize, equations: Box<dyn OdeEquations>) -> Self {
        Self {
            length,
            y: vec![0.0; length],
            y1: vec![0.0; length],
            y0_dot: vec![0.0; length],
            y_dot: vec![0.0; length],
            y_tmp: vec![0.0; length],
            c: vec![0.0; length],
            scale: vec![1.0; length],
            tableau: vec![vec![0.0; length]; sequence_length],
            equations,
        }
    }

    /// Default scaling: `abs_tol + rel_tol * max(|y_a|, |y_b|)`, used whenever
    /// `equations.scale` declines to populate `scale` itself.
    pub fn default_scale(&mut self, y_a: &[f64], y_b: &[f64], abs_tol: f64, rel_tol: f64) {
        for i in 0..self.length {
            self.scale[i] = abs_tol + rel_tol * y_a[i].abs().max(y_b[i].abs());
        }
    }

    pub fn update_scale(&mut self, y_a: &[f64], y_b: &[f64], abs_tol: f64, rel_tol: f64) {
        let mut scale = std::mem::take(&mut self.scale);
        let handled = self.equations.scale(y_a, y_b, &mut scale);
        self.scale = scale;
        if !handled {
            self.default_scale(y_a, y_b, abs_tol, rel_tol);
        }
    }
}
