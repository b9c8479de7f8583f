//! Box-constrained maximisation.
//!
//! ## Purpose
//!
//! Maximises a smooth objective inside an axis-aligned box. Used by the
//! constrained peak refiner so that peaks near the domain edge stay inside
//! the coordinate bounds.
//!
//! ## Design notes
//!
//! * **Projected Newton ascent**: When the Hessian is negative definite
//!   (Cholesky of `-H` succeeds) the Newton direction is used, otherwise the
//!   gradient. Every trial point is projected onto the box.
//! * **Armijo backtracking**: The step is halved until the objective increases
//!   by at least `c * g . (x_new - x)`.
//!
//! ## Invariants
//!
//! * Every returned point lies inside the box.
//! * The objective value never decreases between accepted iterates.

// External dependencies
use nalgebra::{DMatrix, DVector};

/// Default iteration cap.
pub const MAX_ASCENT_ITERATIONS: usize = 200;

/// Armijo sufficient-increase constant.
const ARMIJO_C: f64 = 1e-4;

/// Maximum number of step halvings per iteration.
const MAX_BACKTRACKS: usize = 40;

// ============================================================================
// Options and Outcome
// ============================================================================

/// Stopping rule for [`maximize_box`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AscentOptions {
    /// Stop when the accepted step is at most this long.
    pub tol: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for AscentOptions {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_iterations: MAX_ASCENT_ITERATIONS,
        }
    }
}

/// Result of a box-constrained maximisation.
#[derive(Debug, Clone, PartialEq)]
pub struct AscentOutcome {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective at `point`.
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the step tolerance was reached before the iteration cap.
    pub converged: bool,
}

// ============================================================================
// Solver
// ============================================================================

/// Project `x` onto the box in place.
pub fn project(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (xi, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *xi = xi.clamp(lo, hi);
    }
}

/// Maximise `objective` inside `bounds` starting from `x0`.
pub fn maximize_box<F, G, H>(
    mut objective: F,
    mut gradient: G,
    mut hessian: H,
    x0: &[f64],
    bounds: &[(f64, f64)],
    options: AscentOptions,
) -> AscentOutcome
where
    F: FnMut(&[f64]) -> f64,
    G: FnMut(&[f64]) -> Vec<f64>,
    H: FnMut(&[f64]) -> DMatrix<f64>,
{
    let mut x = x0.to_vec();
    project(&mut x, bounds);
    let mut fx = objective(&x);

    for iteration in 0..options.max_iterations {
        let g = gradient(&x);
        if g.iter().any(|v| !v.is_finite()) {
            return AscentOutcome {
                point: x,
                value: fx,
                iterations: iteration,
                converged: false,
            };
        }

        let h = hessian(&x);
        let h = (&h + h.transpose()) * 0.5;
        let gv = DVector::from_column_slice(&g);
        let direction = (-h)
            .cholesky()
            .map(|chol| chol.solve(&gv))
            .filter(|d| d.iter().all(|v| v.is_finite()))
            .unwrap_or_else(|| gv.clone());

        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let mut trial: Vec<f64> = x
                .iter()
                .zip(direction.iter())
                .map(|(xi, di)| xi + alpha * di)
                .collect();
            project(&mut trial, bounds);

            let moved: f64 = trial.iter().zip(&x).zip(&g).map(|((t, xi), gi)| gi * (t - xi)).sum();
            let ft = objective(&trial);
            if ft.is_finite() && ft >= fx + ARMIJO_C * moved {
                accepted = Some((trial, ft));
                break;
            }
            alpha *= 0.5;
        }

        let Some((trial, ft)) = accepted else {
            return AscentOutcome {
                point: x,
                value: fx,
                iterations: iteration,
                converged: true,
            };
        };

        let step: f64 = trial
            .iter()
            .zip(&x)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        x = trial;
        fx = ft;

        if step <= options.tol {
            return AscentOutcome {
                point: x,
                value: fx,
                iterations: iteration + 1,
                converged: true,
            };
        }
    }

    AscentOutcome {
        point: x,
        value: fx,
        iterations: options.max_iterations,
        converged: false,
    }
}
