//! Forward-difference derivative generator.
//!
//! ## Purpose
//!
//! Turns any scalar- or vector-valued function of 1, 2 or 3 variables into
//! first and second derivative functions by forward differences. Used to
//! differentiate continuous fields when analytic derivatives are unavailable.
//!
//! ## Design notes
//!
//! * **Explicit dimension**: The caller states the input dimension; it is not
//!   guessed by probing the function.
//! * **Nested differences**: `fprime2` is the forward difference of `fprime`
//!   with the same step, matching how the first derivative is formed.
//!
//! ## Key concepts
//!
//! * **fprime**: Jacobian `J[i][k] = (f_i(x + h e_k) - f_i(x)) / h`, shape `m x D`.
//! * **fprime2**: `H[i][j][k] = (J_ij(x + h e_k) - J_ij(x)) / h`, shape `m x D x D`.
//! * **Truncation error**: O(h) for both; for quadratics `fprime2` is exact up
//!   to rounding.
//!
//! ## Invariants
//!
//! * `1 <= dim <= 3` and `h` is finite and positive.
//! * The function returns the same non-zero number of finite outputs at every
//!   evaluated point, or the call fails.

// External dependencies
use ndarray::{Array2, Array3};

// Internal dependencies
use crate::primitives::errors::FieldError;

/// Default forward-difference step.
pub const DEFAULT_STEP: f64 = 1e-4;

/// Largest supported input dimension.
pub const MAX_DERIVATIVE_DIM: usize = 3;

// ============================================================================
// Derivative Set
// ============================================================================

/// First and second forward-difference derivatives of a function.
#[derive(Clone)]
pub struct Derivatives<F> {
    f: F,
    dim: usize,
    h: f64,
}

impl<F> std::fmt::Debug for Derivatives<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derivatives")
            .field("dim", &self.dim)
            .field("h", &self.h)
            .finish_non_exhaustive()
    }
}

/// Build derivative functions for `f: R^dim -> R^m`.
///
/// `h` defaults to [`DEFAULT_STEP`].
pub fn make_derivatives<F>(f: F, dim: usize, h: Option<f64>) -> Result<Derivatives<F>, FieldError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    if dim == 0 || dim > MAX_DERIVATIVE_DIM {
        return Err(FieldError::UnsupportedDimension {
            dim,
            max: MAX_DERIVATIVE_DIM,
            operation: "make_derivatives",
        });
    }

    let h = h.unwrap_or(DEFAULT_STEP);
    if !h.is_finite() || h <= 0.0 {
        return Err(FieldError::InvalidParameter {
            parameter: "h",
            reason: format!("step must be finite and > 0, got {h}"),
        });
    }

    Ok(Derivatives { f, dim, h })
}

/// Build derivative functions for a scalar function `f: R^dim -> R`.
pub fn make_scalar_derivatives<G>(
    g: G,
    dim: usize,
    h: Option<f64>,
) -> Result<Derivatives<impl Fn(&[f64]) -> Vec<f64>>, FieldError>
where
    G: Fn(&[f64]) -> f64,
{
    make_derivatives(move |x: &[f64]| vec![g(x)], dim, h)
}

impl<F> Derivatives<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    /// Input dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Forward-difference step.
    #[inline]
    pub fn step(&self) -> f64 {
        self.h
    }

    /// Forward-difference Jacobian at `x`, shape `m x D`.
    pub fn fprime(&self, x: &[f64]) -> Result<Array2<f64>, FieldError> {
        self.check_point(x)?;

        let f0 = self.eval(x, None)?;
        let m = f0.len();
        let mut jac = Array2::<f64>::zeros((m, self.dim));
        let mut shifted = x.to_vec();

        for k in 0..self.dim {
            shifted[k] = x[k] + self.h;
            let fk = self.eval(&shifted, Some(m))?;
            shifted[k] = x[k];

            for i in 0..m {
                jac[[i, k]] = (fk[i] - f0[i]) / self.h;
            }
        }

        Ok(jac)
    }

    /// Forward difference of [`Self::fprime`] at `x`, shape `m x D x D`.
    pub fn fprime2(&self, x: &[f64]) -> Result<Array3<f64>, FieldError> {
        let j0 = self.fprime(x)?;
        let m = j0.nrows();
        let mut out = Array3::<f64>::zeros((m, self.dim, self.dim));
        let mut shifted = x.to_vec();

        for k in 0..self.dim {
            shifted[k] = x[k] + self.h;
            let jk = self.fprime(&shifted)?;
            shifted[k] = x[k];

            for i in 0..m {
                for j in 0..self.dim {
                    out[[i, j, k]] = (jk[[i, j]] - j0[[i, j]]) / self.h;
                }
            }
        }

        Ok(out)
    }

    /// Gradient of the first output component.
    pub fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, FieldError> {
        Ok(self.fprime(x)?.row(0).to_vec())
    }

    /// Hessian of the first output component, shape `D x D`.
    pub fn hessian(&self, x: &[f64]) -> Result<Array2<f64>, FieldError> {
        Ok(self
            .fprime2(x)?
            .index_axis(ndarray::Axis(0), 0)
            .to_owned())
    }

    fn check_point(&self, x: &[f64]) -> Result<(), FieldError> {
        if x.len() != self.dim {
            return Err(FieldError::ShapeMismatch {
                what: "derivative evaluation point",
                expected: format!("{} coordinates", self.dim),
                got: format!("{} coordinates", x.len()),
            });
        }
        Ok(())
    }

    fn eval(&self, x: &[f64], expected_len: Option<usize>) -> Result<Vec<f64>, FieldError> {
        let out = (self.f)(x);
        if out.is_empty() {
            return Err(FieldError::InvalidNumericValue(
                "function returned no values".into(),
            ));
        }
        if let Some(m) = expected_len {
            if out.len() != m {
                return Err(FieldError::ShapeMismatch {
                    what: "function output",
                    expected: format!("{m} values"),
                    got: format!("{} values", out.len()),
                });
            }
        }
        if let Some(pos) = out.iter().position(|v| !v.is_finite()) {
            return Err(FieldError::InvalidNumericValue(format!(
                "f({x:?})[{pos}]={}",
                out[pos]
            )));
        }
        Ok(out)
    }
}
