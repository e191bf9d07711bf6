//! The integration engine - vector fields and fixed-step explicit Euler.
//!
//! The update is deliberately simple: one forward Euler step of size `dt`
//! per frame, no adaptivity. Every step performs the same floating-point
//! operations in the same order, so a trajectory is bit-reproducible from
//! its seed and `dt`.

use crate::error::NumericalError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// A deterministic vector field `f(state)`.
pub trait VectorField: Send + Sync + 'static {
    /// Short name for logs and CLI selection.
    fn name(&self) -> &'static str;

    /// Whether the field is defined for states with `dimension` components.
    fn accepts(&self, dimension: usize) -> bool;

    /// Instantaneous derivative at `state`.
    ///
    /// Callers guarantee `accepts(state.len())`.
    fn derivative(&self, state: &DVector<f64>) -> DVector<f64>;
}

/// Parameters of the Lorenz system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorenzParams {
    /// Prandtl number (sigma)
    pub s: f64,
    /// Rayleigh number (rho)
    pub r: f64,
    /// Geometric factor (beta)
    pub b: f64,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            s: 10.0,
            r: 28.0,
            b: 2.667,
        }
    }
}

/// The Lorenz attractor on `(x, y, z)`.
///
/// ```text
/// dx = s*(y - x)
/// dy = r*x - y - x*z
/// dz = x*y - b*z
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Lorenz {
    pub params: LorenzParams,
}

impl Lorenz {
    pub fn new(params: LorenzParams) -> Self {
        Self { params }
    }
}

impl VectorField for Lorenz {
    fn name(&self) -> &'static str {
        "lorenz"
    }

    fn accepts(&self, dimension: usize) -> bool {
        dimension == 3
    }

    fn derivative(&self, state: &DVector<f64>) -> DVector<f64> {
        let LorenzParams { s, r, b } = self.params;
        let (x, y, z) = (state[0], state[1], state[2]);

        let x_dot = s * (y - x);
        let y_dot = r * x - y - x * z;
        let z_dot = x * y - b * z;

        DVector::from_vec(vec![x_dot, y_dot, z_dot])
    }
}

/// Exponential decay `dx_i = -rate * x_i`, defined for any dimension.
///
/// Used for table payloads where no physical model applies.
#[derive(Debug, Clone, Copy)]
pub struct LinearDecay {
    pub rate: f64,
}

impl Default for LinearDecay {
    fn default() -> Self {
        Self { rate: 0.1 }
    }
}

impl VectorField for LinearDecay {
    fn name(&self) -> &'static str {
        "decay"
    }

    fn accepts(&self, dimension: usize) -> bool {
        dimension > 0
    }

    fn derivative(&self, state: &DVector<f64>) -> DVector<f64> {
        state.map(|v| -self.rate * v)
    }
}

/// One explicit Euler step: `state + f(state) * dt`.
///
/// The result is a new vector; `state` is never touched, so a rejected step
/// leaves the caller's state exactly as it was.
///
/// # Errors
/// * `DimensionMismatch` - the field is not defined for this state size
/// * `NonFinite` - the derivative or the new state contains NaN/Inf
pub fn euler_step<F: VectorField + ?Sized>(
    field: &F,
    state: &DVector<f64>,
    dt: f64,
) -> Result<DVector<f64>, NumericalError> {
    if !field.accepts(state.len()) {
        return Err(NumericalError::DimensionMismatch {
            field: field.name(),
            dimension: state.len(),
        });
    }

    let derivative = field.derivative(state);
    let next = state + derivative * dt;

    if let Some(index) = next.iter().position(|v| !v.is_finite()) {
        return Err(NumericalError::NonFinite { component: index });
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ones() -> DVector<f64> {
        DVector::from_vec(vec![1.0, 1.0, 1.0])
    }

    #[test]
    fn test_lorenz_derivative_at_unit_seed() {
        let field = Lorenz::default();
        let d = field.derivative(&ones());

        assert_relative_eq!(d[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(d[1], 26.0, epsilon = 1e-9); // 28*1 - 1 - 1*1
        assert_relative_eq!(d[2], -1.667, epsilon = 1e-9);
    }

    #[test]
    fn test_first_euler_step() {
        let next = euler_step(&Lorenz::default(), &ones(), 0.01).unwrap();

        assert_relative_eq!(next[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(next[1], 1.26, epsilon = 1e-9);
        assert_relative_eq!(next[2], 0.98333, epsilon = 1e-9);
    }

    #[test]
    fn test_step_is_bit_reproducible() {
        let field = Lorenz::default();
        let mut a = ones();
        let mut b = ones();
        for _ in 0..1000 {
            a = euler_step(&field, &a, 0.01).unwrap();
            b = euler_step(&field, &b, 0.01).unwrap();
        }
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_matches_scalar_formula() {
        // Same operation order as the textbook update, component by component
        let field = Lorenz::default();
        let state = DVector::from_vec(vec![-3.2, 4.7, 20.1]);
        let next = euler_step(&field, &state, 0.01).unwrap();

        let (x, y, z) = (-3.2f64, 4.7f64, 20.1f64);
        let expected = [
            x + (10.0 * (y - x)) * 0.01,
            y + (28.0 * x - y - x * z) * 0.01,
            z + (x * y - 2.667 * z) * 0.01,
        ];
        for (got, want) in next.iter().zip(expected.iter()) {
            assert_eq!(got.to_bits(), want.to_bits());
        }
    }

    #[test]
    fn test_lorenz_rejects_wrong_dimension() {
        let state = DVector::from_vec(vec![1.0, 2.0]);
        let err = euler_step(&Lorenz::default(), &state, 0.01).unwrap_err();
        assert!(matches!(err, NumericalError::DimensionMismatch { dimension: 2, .. }));
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let state = DVector::from_vec(vec![f64::MAX, f64::MAX, f64::MAX]);
        let err = euler_step(&Lorenz::default(), &state, 0.01).unwrap_err();
        assert!(matches!(err, NumericalError::NonFinite { .. }));
    }

    #[test]
    fn test_decay_any_dimension() {
        let field = LinearDecay { rate: 0.5 };
        let state = DVector::from_vec(vec![2.0, -4.0, 8.0, 1.0, 0.0]);
        let next = euler_step(&field, &state, 0.1).unwrap();

        assert_relative_eq!(next[0], 1.9, epsilon = 1e-12);
        assert_relative_eq!(next[1], -3.8, epsilon = 1e-12);
        assert_relative_eq!(next[4], 0.0, epsilon = 1e-12);
        assert!(!field.accepts(0));
    }
}
