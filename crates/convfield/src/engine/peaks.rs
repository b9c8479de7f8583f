//! Sub-voxel peak localisation on the continuous t-field.
//!
//! ## Purpose
//!
//! This module seeds peak searches from the lattice t-statistic (or from
//! user-supplied locations) and refines each seed to a local maximum of the
//! continuous t-field.
//!
//! ## Design notes
//!
//! * **Shared seeding**: Both refinement strategies consume the same seed list.
//! * **Strategy trait**: `PeakRefiner` abstracts over root finding and
//!   box-constrained maximisation.
//! * **Explicit retry state**: Root finding walks a small state machine
//!   (`Seeded -> Converged | Diverged -> GridFallback -> Seeded .. -> Failed`)
//!   instead of nested retry loops. Every rejected Newton run, whether it
//!   diverged, stalled or landed on a non-maximum, passes through the grid
//!   fallback once before seeds are perturbed.
//! * **Parallelism**: With the `parallel` feature, peaks are refined with rayon;
//!   results keep seed order.
//!
//! ## Key concepts
//!
//! * **Divergence**: A Newton solution further than `DIVERGENCE_RADIUS` from its
//!   original seed is rejected.
//! * **Curvature check**: A stationary point is only a peak when the Hessian
//!   there is negative semidefinite, up to `CURVATURE_TOLERANCE`.
//! * **Grid fallback**: The `±GRID_HALF_WIDTH` window around the original seed
//!   is sampled at `GRID_STEP`; the best point becomes the next seed.
//! * **Perturbation**: After a solver failure every coordinate of the seed is
//!   shifted by `SEED_PERTURBATION`.
//!
//! ## Invariants
//!
//! * Output peaks follow seed order.
//! * A refinement either converges or fails with `NonConvergence`; there is no
//!   best-effort output from root finding.
//!
//! ## Non-goals
//!
//! * This module does not deduplicate peaks that converge to the same point.

// Feature-gated imports
#[cfg(feature = "parallel")]
use rayon::prelude::*;

// External dependencies
use nalgebra::DMatrix;
use ndarray::Array2;
use tracing::{debug, warn};

// Internal dependencies
use crate::algorithms::maxima::top_k_local_maxima;
use crate::algorithms::newton::{newton_raphson, NewtonFailure, NewtonOptions, MAX_NEWTON_ITERATIONS};
use crate::algorithms::optimize::{maximize_box, AscentOptions};
use crate::engine::output::{Peak, PeakResult, RefinementMethod, RefinementTrace};
use crate::engine::tfield::{ContinuousTField, FieldDerivatives};
use crate::math::derivatives::{make_scalar_derivatives, DEFAULT_STEP};
use crate::math::stats::t_stat_lattice;
use crate::primitives::errors::FieldError;
use crate::primitives::lattice::LatticeField;

// ============================================================================
// Constants
// ============================================================================

/// Newton-Raphson runs allowed per peak before giving up.
pub const MAX_REFINEMENT_ATTEMPTS: usize = 10;

/// Largest accepted distance between a solution and its original seed.
pub const DIVERGENCE_RADIUS: f64 = 3.0;

/// Half-width of the grid-fallback window.
pub const GRID_HALF_WIDTH: f64 = 1.0;

/// Spacing of the grid-fallback window.
pub const GRID_STEP: f64 = 0.25;

/// Per-axis shift applied to a seed after a solver failure.
pub const SEED_PERTURBATION: f64 = 0.1;

/// Smallest Newton tolerance; finite-difference noise dominates below it.
const MIN_NEWTON_TOL: f64 = 1e-10;

/// Largest Hessian eigenvalue accepted at a peak, relative to `1 + |t|`.
pub const CURVATURE_TOLERANCE: f64 = 1e-4;

// ============================================================================
// Configuration Types
// ============================================================================

/// Where peak searches start.
#[derive(Debug, Clone, PartialEq)]
pub enum PeakSeeds {
    /// The `k` largest lattice local maxima of the t-statistic.
    Auto(usize),

    /// Explicit starting locations, one column per peak (`D x K`).
    Explicit(Array2<f64>),
}

impl Default for PeakSeeds {
    fn default() -> Self {
        PeakSeeds::Auto(1)
    }
}

impl From<usize> for PeakSeeds {
    fn from(k: usize) -> Self {
        PeakSeeds::Auto(k)
    }
}

impl From<Array2<f64>> for PeakSeeds {
    fn from(points: Array2<f64>) -> Self {
        PeakSeeds::Explicit(points)
    }
}

/// Peak refinement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refinement {
    /// Newton-Raphson on the gradient.
    #[default]
    RootFinding,

    /// Box-constrained maximisation inside the coordinate bounds.
    Constrained,
}

/// How gradients and Hessians of the t-field are obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivativeMethod {
    /// Forward differences of the t-field with the given step.
    FiniteDifference {
        /// Difference step.
        step: f64,
    },

    /// Kernel derivatives propagated through the t-statistic.
    Analytic,
}

impl Default for DerivativeMethod {
    fn default() -> Self {
        DerivativeMethod::FiniteDifference { step: DEFAULT_STEP }
    }
}

// ============================================================================
// Objective
// ============================================================================

/// The scalar field being maximised: `t(x)`, or `t(x) * m(x)` when mask-weighted.
#[derive(Debug, Clone, Copy)]
pub struct Objective<'a> {
    field: &'a ContinuousTField,
    method: DerivativeMethod,
    mask_weighted: bool,
}

impl<'a> Objective<'a> {
    /// Wrap a t-field.
    pub fn new(field: &'a ContinuousTField, method: DerivativeMethod, mask_weighted: bool) -> Self {
        Self {
            field,
            method,
            mask_weighted,
        }
    }

    /// Number of spatial dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.field.dim()
    }

    /// Underlying t-field.
    #[inline]
    pub fn field(&self) -> &'a ContinuousTField {
        self.field
    }

    /// Objective value.
    pub fn value(&self, x: &[f64]) -> f64 {
        if self.mask_weighted {
            self.field.weighted_t_at(x)
        } else {
            self.field.t_at(x)
        }
    }

    /// Objective gradient; `NaN` entries when it cannot be formed.
    pub fn gradient(&self, x: &[f64]) -> Vec<f64> {
        match self.method {
            DerivativeMethod::Analytic => self.analytic(x).gradient,
            DerivativeMethod::FiniteDifference { step } => {
                make_scalar_derivatives(|p| self.value(p), self.dim(), Some(step))
                    .and_then(|d| d.gradient(x))
                    .unwrap_or_else(|_| vec![f64::NAN; self.dim()])
            }
        }
    }

    /// Objective Hessian; `NaN` entries when it cannot be formed.
    pub fn hessian(&self, x: &[f64]) -> DMatrix<f64> {
        let d = self.dim();
        let h = match self.method {
            DerivativeMethod::Analytic => Ok(self.analytic(x).hessian),
            DerivativeMethod::FiniteDifference { step } => {
                make_scalar_derivatives(|p| self.value(p), d, Some(step)).and_then(|fd| fd.hessian(x))
            }
        };
        match h {
            Ok(h) => DMatrix::from_fn(d, d, |i, j| h[[i, j]]),
            Err(_) => DMatrix::from_element(d, d, f64::NAN),
        }
    }

    fn analytic(&self, x: &[f64]) -> FieldDerivatives {
        if self.mask_weighted {
            self.field.weighted_derivatives_at(x)
        } else {
            self.field.derivatives_at(x)
        }
    }
}

// ============================================================================
// Refiner Trait
// ============================================================================

/// Strategy turning a seed into a refined peak.
pub trait PeakRefiner: Sync {
    /// Strategy identifier recorded on each peak.
    fn method(&self) -> RefinementMethod;

    /// Refine seed number `peak` starting at `seed`.
    fn refine(
        &self,
        objective: &Objective<'_>,
        peak: usize,
        seed: &[f64],
    ) -> Result<(Peak, RefinementTrace), FieldError>;
}

// ============================================================================
// Root Finding
// ============================================================================

/// State of a single root-finding refinement.
#[derive(Debug, Clone, PartialEq)]
enum RefineState {
    /// Ready to run Newton-Raphson from this point.
    Seeded(Vec<f64>),
    /// A solution within the divergence radius was found.
    Converged(Vec<f64>),
    /// The last run from this point was rejected.
    Diverged(Vec<f64>),
    /// Sample the window around the original seed.
    GridFallback,
    /// The attempt budget is exhausted.
    Failed,
}

/// Newton-Raphson refinement with divergence recovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootFindingRefiner {
    /// Newton runs allowed per peak.
    pub max_attempts: usize,
    /// Iteration cap per Newton run.
    pub max_iterations: usize,
}

impl Default for RootFindingRefiner {
    fn default() -> Self {
        Self {
            max_attempts: MAX_REFINEMENT_ATTEMPTS,
            max_iterations: MAX_NEWTON_ITERATIONS,
        }
    }
}

impl RootFindingRefiner {
    /// Tolerance scaled to the gradient at the seed.
    pub fn tolerance(gradient_norm: f64) -> f64 {
        (gradient_norm / 1e5).min(1e-4).max(MIN_NEWTON_TOL)
    }

    fn grid_argmax(objective: &Objective<'_>, origin: &[f64]) -> Option<Vec<f64>> {
        let d = origin.len();
        let per_axis = (2.0 * GRID_HALF_WIDTH / GRID_STEP).round() as usize + 1;
        let total = per_axis.pow(d as u32);

        let mut best: Option<(Vec<f64>, f64)> = None;
        for code in 0..total {
            let mut c = code;
            let point: Vec<f64> = origin
                .iter()
                .map(|&o| {
                    let k = c % per_axis;
                    c /= per_axis;
                    o - GRID_HALF_WIDTH + k as f64 * GRID_STEP
                })
                .collect();

            let value = objective.value(&point);
            if value.is_finite() && best.as_ref().map_or(true, |(_, b)| value > *b) {
                best = Some((point, value));
            }
        }
        best.map(|(p, _)| p)
    }

    /// Whether the objective Hessian at `point` is negative semidefinite.
    fn is_maximum(objective: &Objective<'_>, point: &[f64]) -> bool {
        let hessian = objective.hessian(point);
        if hessian.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let symmetric = (&hessian + hessian.transpose()) * 0.5;
        let largest = symmetric.symmetric_eigenvalues().max();
        largest <= CURVATURE_TOLERANCE * (1.0 + objective.value(point).abs())
    }
}

fn perturb(x: &[f64]) -> Vec<f64> {
    x.iter().map(|v| v + SEED_PERTURBATION).collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl PeakRefiner for RootFindingRefiner {
    fn method(&self) -> RefinementMethod {
        RefinementMethod::RootFinding
    }

    fn refine(
        &self,
        objective: &Objective<'_>,
        peak: usize,
        seed: &[f64],
    ) -> Result<(Peak, RefinementTrace), FieldError> {
        let origin = seed.to_vec();
        let seed_gradient = objective.gradient(seed);
        let options = NewtonOptions {
            tol: Self::tolerance(seed_gradient.iter().map(|g| g * g).sum::<f64>().sqrt()),
            max_iterations: self.max_iterations,
        };

        let mut trace = RefinementTrace::default();
        let mut state = RefineState::Seeded(origin.clone());

        loop {
            state = match state {
                RefineState::Seeded(x) => {
                    if trace.attempts >= self.max_attempts {
                        RefineState::Failed
                    } else {
                        trace.attempts += 1;
                        let result = newton_raphson(
                            |p| objective.gradient(p),
                            &x,
                            |p| objective.hessian(p),
                            options,
                        );
                        match result {
                            Ok(sol)
                                if sol.point.iter().all(|v| v.is_finite())
                                    && distance(&sol.point, &origin) <= DIVERGENCE_RADIUS =>
                            {
                                if Self::is_maximum(objective, &sol.point) {
                                    debug!(peak, attempt = trace.attempts, iterations = sol.iterations, "newton converged");
                                    RefineState::Converged(sol.point)
                                } else {
                                    debug!(peak, attempt = trace.attempts, "newton reached a non-maximum stationary point");
                                    RefineState::Diverged(x)
                                }
                            }
                            Ok(_) | Err(NewtonFailure::NonFinite { .. }) => {
                                debug!(peak, attempt = trace.attempts, "newton diverged");
                                RefineState::Diverged(x)
                            }
                            Err(failure) => {
                                debug!(peak, attempt = trace.attempts, ?failure, "newton failed");
                                RefineState::Diverged(x)
                            }
                        }
                    }
                }
                RefineState::Diverged(x) => {
                    if trace.used_grid {
                        RefineState::Seeded(perturb(&x))
                    } else {
                        RefineState::GridFallback
                    }
                }
                RefineState::GridFallback => {
                    trace.used_grid = true;
                    warn!(peak, "newton rejected, falling back to a local grid search");
                    match Self::grid_argmax(objective, &origin) {
                        Some(best) => RefineState::Seeded(best),
                        None => RefineState::Seeded(perturb(&origin)),
                    }
                }
                RefineState::Converged(location) => {
                    let value = objective.value(&location);
                    return Ok((
                        Peak {
                            location,
                            value,
                            method: self.method(),
                        },
                        trace,
                    ));
                }
                RefineState::Failed => {
                    return Err(FieldError::NonConvergence {
                        peak,
                        attempts: trace.attempts,
                    });
                }
            };
        }
    }
}

// ============================================================================
// Constrained
// ============================================================================

/// Box-constrained maximisation inside the coordinate bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstrainedRefiner {
    /// Ascent stopping rule.
    pub options: AscentOptions,
}

impl PeakRefiner for ConstrainedRefiner {
    fn method(&self) -> RefinementMethod {
        RefinementMethod::Constrained
    }

    fn refine(
        &self,
        objective: &Objective<'_>,
        peak: usize,
        seed: &[f64],
    ) -> Result<(Peak, RefinementTrace), FieldError> {
        let bounds = objective.field().coords().bounds();
        let outcome = maximize_box(
            |p| objective.value(p),
            |p| objective.gradient(p),
            |p| objective.hessian(p),
            seed,
            &bounds,
            self.options,
        );

        if !outcome.converged {
            warn!(
                peak,
                iterations = outcome.iterations,
                "constrained ascent reached its iteration cap; returning best point"
            );
        } else {
            debug!(peak, iterations = outcome.iterations, "constrained ascent converged");
        }

        Ok((
            Peak {
                location: outcome.point,
                value: outcome.value,
                method: self.method(),
            },
            RefinementTrace {
                attempts: 1,
                used_grid: false,
                hit_iteration_cap: !outcome.converged,
            },
        ))
    }
}

// ============================================================================
// Seeding
// ============================================================================

/// Resolve seeds into coordinate-space starting points.
pub fn resolve_seeds(
    data: &LatticeField,
    field: &ContinuousTField,
    seeds: &PeakSeeds,
) -> Result<Vec<Vec<f64>>, FieldError> {
    let d = field.dim();
    match seeds {
        PeakSeeds::Auto(k) => {
            let lattice_t = t_stat_lattice(&data.view());
            let maxima = top_k_local_maxima(&lattice_t.view(), *k, &field.mask().view());
            if maxima.len() < *k {
                warn!(
                    requested = *k,
                    found = maxima.len(),
                    "fewer lattice local maxima than requested peaks"
                );
            }
            Ok(maxima
                .iter()
                .map(|index| field.coords().coordinate(index))
                .collect())
        }
        PeakSeeds::Explicit(points) => {
            if points.nrows() != d {
                return Err(FieldError::ShapeMismatch {
                    what: "peak seeds",
                    expected: format!("{d} rows (one per axis)"),
                    got: format!("{} rows", points.nrows()),
                });
            }

            let mut out = Vec::with_capacity(points.ncols());
            for (k, column) in points.columns().into_iter().enumerate() {
                if column.iter().all(|v| v.is_finite()) {
                    out.push(column.to_vec());
                } else if d == 1 {
                    debug!(seed = k, "dropping non-finite seed");
                } else {
                    return Err(FieldError::InvalidNumericValue(format!(
                        "seed column {k} is not finite"
                    )));
                }
            }
            Ok(out)
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Refine every seed with `refiner`, preserving seed order.
pub fn refine_all<R>(
    objective: &Objective<'_>,
    seeds: &[Vec<f64>],
    refiner: &R,
) -> Result<PeakResult, FieldError>
where
    R: PeakRefiner + ?Sized,
{
    #[cfg(feature = "parallel")]
    let refined: Vec<(Peak, RefinementTrace)> = seeds
        .par_iter()
        .enumerate()
        .map(|(k, seed)| refiner.refine(objective, k, seed))
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let refined: Vec<(Peak, RefinementTrace)> = seeds
        .iter()
        .enumerate()
        .map(|(k, seed)| refiner.refine(objective, k, seed))
        .collect::<Result<_, _>>()?;

    let (peaks, traces): (Vec<_>, Vec<_>) = refined.into_iter().unzip();
    Ok(PeakResult { peaks, traces })
}
