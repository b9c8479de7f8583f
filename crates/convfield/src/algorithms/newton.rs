//! Newton-Raphson root finding for gradient fields.
//!
//! ## Purpose
//!
//! Solves `grad f(x) = 0` from an initial point using the Hessian, for
//! locating critical points of continuous fields.
//!
//! ## Design notes
//!
//! * **Linear solve**: Each step solves `H s = g` by LU decomposition
//!   (`nalgebra`); a singular Hessian is reported, not regularised.
//! * **Failures are values**: The solver never clamps or returns a best
//!   effort. Callers decide how to recover from each failure kind.
//!
//! ## Invariants
//!
//! * A returned point satisfies `|step| <= tol` or `|grad| <= tol`.

// External dependencies
use nalgebra::{DMatrix, DVector};

/// Default iteration cap.
pub const MAX_NEWTON_ITERATIONS: usize = 100;

// ============================================================================
// Options and Failures
// ============================================================================

/// Stopping rule for [`newton_raphson`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonOptions {
    /// Convergence tolerance on the step and gradient norms.
    pub tol: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            tol: 1e-4,
            max_iterations: MAX_NEWTON_ITERATIONS,
        }
    }
}

/// Why Newton-Raphson stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NewtonFailure {
    /// The Hessian could not be inverted.
    Singular {
        /// Iteration at which the solve failed.
        iteration: usize,
    },

    /// An iterate, gradient or step became NaN or infinite.
    NonFinite {
        /// Iteration at which the non-finite value appeared.
        iteration: usize,
    },

    /// The iteration cap was reached.
    NotConverged {
        /// Iterations performed.
        iterations: usize,
    },
}

/// Converged Newton-Raphson solution.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonSolution {
    /// Root of the gradient.
    pub point: Vec<f64>,
    /// Iterations performed.
    pub iterations: usize,
}

// ============================================================================
// Solver
// ============================================================================

#[inline]
fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Find a root of `gradient` starting at `x0`.
pub fn newton_raphson<G, H>(
    mut gradient: G,
    x0: &[f64],
    mut hessian: H,
    options: NewtonOptions,
) -> Result<NewtonSolution, NewtonFailure>
where
    G: FnMut(&[f64]) -> Vec<f64>,
    H: FnMut(&[f64]) -> DMatrix<f64>,
{
    let mut x = x0.to_vec();

    for iteration in 0..options.max_iterations {
        let g = gradient(&x);
        if g.iter().any(|v| !v.is_finite()) {
            return Err(NewtonFailure::NonFinite { iteration });
        }
        if norm(&g) <= options.tol {
            return Ok(NewtonSolution {
                point: x,
                iterations: iteration,
            });
        }

        let h = hessian(&x);
        if h.iter().any(|v| !v.is_finite()) {
            return Err(NewtonFailure::NonFinite { iteration });
        }

        let step = h
            .lu()
            .solve(&DVector::from_vec(g))
            .ok_or(NewtonFailure::Singular { iteration })?;
        if step.iter().any(|v| !v.is_finite()) {
            return Err(NewtonFailure::NonFinite { iteration });
        }

        for (xi, si) in x.iter_mut().zip(step.iter()) {
            *xi -= si;
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(NewtonFailure::NonFinite { iteration });
        }

        if step.norm() <= options.tol {
            return Ok(NewtonSolution {
                point: x,
                iterations: iteration + 1,
            });
        }
    }

    Err(NewtonFailure::NotConverged {
        iterations: options.max_iterations,
    })
}
