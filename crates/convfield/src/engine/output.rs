//! Output types and result structures for convolution-field operations.
//!
//! ## Purpose
//!
//! This module defines the results returned by the three engines: the
//! continuous t-field evaluation (`TFieldResult`), peak localisation
//! (`PeakResult`) and LKC estimation (`LkcResult` with its `Geometry`).
//!
//! ## Design notes
//!
//! * **Plain data**: All fields are public; results carry no behaviour beyond
//!   small query helpers.
//! * **Ergonomics**: Implements `Display` for human-readable summaries.
//! * **Partial results**: Curvatures that are not computed for a
//!   dimensionality are `None` rather than a sentinel value.
//!
//! ## Invariants
//!
//! * Every per-point vector of a `TFieldResult` has one entry per query point.
//! * `PeakResult::peaks` and `PeakResult::traces` have the same length and
//!   follow seed order.
//! * All `Geometry` fields live on the same trimmed fine grid.
//!
//! ## Non-goals
//!
//! * This module does not perform calculations; it only stores results.
//! * This module does not provide serialization/deserialization logic.

// External dependencies
use core::fmt::{Display, Formatter, Result};
use ndarray::{Array2, ArrayD};

// ============================================================================
// t-Field Result
// ============================================================================

/// Continuous t-field evaluated at a set of query points.
#[derive(Debug, Clone, PartialEq)]
pub struct TFieldResult {
    /// One-sample t-statistic per query point.
    pub tstat: Vec<f64>,

    /// Mean over subjects per query point.
    pub mean: Vec<f64>,

    /// Sample standard deviation (divisor `n - 1`) per query point.
    pub sd: Vec<f64>,

    /// Cohen's d per query point.
    pub cohens_d: Vec<f64>,

    /// Convolution field of every subject, shape `M x nsubj`.
    pub subject_values: Array2<f64>,

    /// Query points where the standard deviation is exactly zero.
    pub degenerate: Vec<usize>,
}

impl TFieldResult {
    /// Number of query points.
    pub fn len(&self) -> usize {
        self.tstat.len()
    }

    /// Whether no query points were evaluated.
    pub fn is_empty(&self) -> bool {
        self.tstat.is_empty()
    }

    /// Number of subjects.
    pub fn nsubj(&self) -> usize {
        self.subject_values.ncols()
    }

    /// Whether any query point had zero variance.
    pub fn has_degenerate(&self) -> bool {
        !self.degenerate.is_empty()
    }
}

impl Display for TFieldResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "  Query points: {}", self.len())?;
        writeln!(f, "  Subjects:     {}", self.nsubj())?;
        if self.has_degenerate() {
            writeln!(f, "  Degenerate:   {}", self.degenerate.len())?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "{:>6} {:>12} {:>12} {:>12} {:>12}",
            "Point", "t", "Mean", "SD", "Cohen_d"
        )?;
        writeln!(f, "{:-<58}", "")?;

        let n = self.len();
        let rows: Vec<usize> = if n <= 20 {
            (0..n).collect()
        } else {
            (0..10).chain(n - 10..n).collect()
        };

        for (pos, &i) in rows.iter().enumerate() {
            if pos == 10 && n > 20 {
                writeln!(f, "{:>6}", "...")?;
            }
            writeln!(
                f,
                "{:>6} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
                i, self.tstat[i], self.mean[i], self.sd[i], self.cohens_d[i]
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Peak Result
// ============================================================================

/// Strategy that produced a peak location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementMethod {
    /// Newton-Raphson on the gradient of the t-field.
    RootFinding,

    /// Box-constrained maximisation of the (optionally mask-weighted) t-field.
    Constrained,
}

impl Display for RefinementMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            RefinementMethod::RootFinding => write!(f, "root-finding"),
            RefinementMethod::Constrained => write!(f, "constrained"),
        }
    }
}

/// A sub-voxel local maximum of the continuous t-field.
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    /// Location in coordinate space.
    pub location: Vec<f64>,

    /// t-statistic (mask-weighted when requested) at the location.
    pub value: f64,

    /// Strategy that produced the location.
    pub method: RefinementMethod,
}

/// How a single peak was refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefinementTrace {
    /// Solver attempts made (Newton runs or ascent runs).
    pub attempts: usize,

    /// Whether the local grid search fallback was used.
    pub used_grid: bool,

    /// Whether the solver hit its iteration cap before converging.
    pub hit_iteration_cap: bool,
}

/// Located peaks in seed order.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakResult {
    /// Refined peaks.
    pub peaks: Vec<Peak>,

    /// One trace per peak.
    pub traces: Vec<RefinementTrace>,
}

impl PeakResult {
    /// Number of peaks.
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// Whether no peaks were found.
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Peak locations as a `D x K` matrix.
    pub fn locations(&self) -> Array2<f64> {
        let d = self.peaks.first().map_or(0, |p| p.location.len());
        let mut out = Array2::<f64>::zeros((d, self.peaks.len()));
        for (k, peak) in self.peaks.iter().enumerate() {
            for (a, &v) in peak.location.iter().enumerate() {
                out[[a, k]] = v;
            }
        }
        out
    }

    /// Peak values in seed order.
    pub fn values(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.value).collect()
    }
}

impl Display for PeakResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Peaks: {}", self.len())?;
        for (k, (peak, trace)) in self.peaks.iter().zip(&self.traces).enumerate() {
            let loc: Vec<String> = peak.location.iter().map(|v| format!("{v:.4}")).collect();
            write!(
                f,
                "  [{k}] ({}) t={:.6} via {} in {} attempt(s)",
                loc.join(", "),
                peak.value,
                peak.method,
                trace.attempts
            )?;
            if trace.used_grid {
                write!(f, ", grid fallback")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// Geometry and LKC Result
// ============================================================================

/// Induced metric and supporting fields on the trimmed fine grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Riemannian volume form `sqrt(det g)`.
    pub volume_form: ArrayD<f64>,

    /// `Var(Y)`.
    pub var_field: ArrayD<f64>,

    /// `Var(dY/dx_i)` per axis.
    pub deriv_var: Vec<ArrayD<f64>>,

    /// `Cov(Y, dY/dx_i)` per axis.
    pub cov_field_deriv: Vec<ArrayD<f64>>,

    /// `Cov(dY/dx_i, dY/dx_j)` for `i < j`, in `(0,1), (0,2), (1,2)` order.
    pub cov_deriv_pairs: Vec<ArrayD<f64>>,

    /// Metric components `g[i][j]`, symmetric.
    pub metric: Vec<Vec<ArrayD<f64>>>,

    /// Fine-grid spacing in lattice units.
    pub dx: f64,
}

impl Geometry {
    /// Shape of the trimmed fine grid.
    pub fn shape(&self) -> &[usize] {
        self.volume_form.shape()
    }
}

/// Estimated Lipschitz-Killing curvatures.
#[derive(Debug, Clone, PartialEq)]
pub struct LkcResult {
    /// `L1..LD`; `None` where a curvature is not computed for this dimension.
    pub lkc: Vec<Option<f64>>,

    /// Curvatures of kernel-smoothed unit white noise on the same domain.
    pub true_lkc: Option<Vec<Option<f64>>>,

    /// Geometry of the data.
    pub geometry: Geometry,

    /// Geometry of the theoretical covariance, when requested.
    pub theory_geometry: Option<Geometry>,
}

impl LkcResult {
    /// Whether every curvature was computed.
    pub fn is_complete(&self) -> bool {
        self.lkc.iter().all(Option::is_some)
    }

    /// Curvature of order `d` (1-based), if computed.
    pub fn get(&self, d: usize) -> Option<f64> {
        d.checked_sub(1).and_then(|i| self.lkc.get(i).copied().flatten())
    }
}

impl Display for LkcResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.6}"));

        writeln!(f, "Summary:")?;
        writeln!(f, "  Fine grid: {:?}", self.geometry.shape())?;
        writeln!(f, "  Spacing:   {}", self.geometry.dx)?;
        writeln!(f)?;

        writeln!(f, "{:>4} {:>14} {:>14}", "L", "Estimate", "Theory")?;
        writeln!(f, "{:-<34}", "")?;
        for (i, &est) in self.lkc.iter().enumerate() {
            let theory = self
                .true_lkc
                .as_ref()
                .and_then(|t| t.get(i).copied().flatten());
            writeln!(f, "{:>4} {:>14} {:>14}", i + 1, show(est), show(theory))?;
        }
        Ok(())
    }
}
