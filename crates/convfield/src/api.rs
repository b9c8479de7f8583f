//! High-level API for convolution-field operations.
//!
//! ## Purpose
//!
//! This module provides the user-facing entry points: fluent builders for the
//! continuous t-field, peak localisation and LKC estimation, each producing an
//! immutable processor that runs against lattice data.
//!
//! ## Design notes
//!
//! * **Ergonomic**: Fluent builders with documented defaults for every optional
//!   parameter.
//! * **Validated**: Parameters are checked when `.build()` is called; data is
//!   checked when the processor runs.
//! * **Single assignment**: Setting a parameter twice is reported by `build()`.
//!
//! ### Configuration Flow
//!
//! 1. Create a builder, e.g. `TField::new()`.
//! 2. Chain configuration methods (`.fwhm()`, `.mask()`, etc.).
//! 3. Call `.build()` to obtain a processor.
//! 4. Run it: `.evaluate(&data, &points)`, `.find(&data)` or `.estimate(&data)`.

// External dependencies
use ndarray::{Array2, ArrayD};

// Internal dependencies
use crate::engine::lkc::estimate_lkc;
use crate::engine::peaks::{refine_all, resolve_seeds, ConstrainedRefiner, Objective, RootFindingRefiner};
use crate::engine::validator::Validator;
use crate::math::kernel::broadcast_fwhm;

// Publicly re-exported types
pub use crate::algorithms::convolution::Truncation;
pub use crate::engine::output::{
    Geometry, LkcResult, Peak, PeakResult, RefinementMethod, RefinementTrace, TFieldResult,
};
pub use crate::engine::peaks::{DerivativeMethod, PeakSeeds, Refinement};
pub use crate::engine::lkc::LkcConfig;
pub use crate::engine::tfield::{ContinuousTField, FieldDerivatives};
pub use crate::math::derivatives::{make_derivatives, make_scalar_derivatives, Derivatives};
pub use crate::math::kernel::{ExplicitKernel, Kernel};
pub use crate::primitives::errors::FieldError;
pub use crate::primitives::lattice::LatticeField;

fn validate_kernel(kernel: &Kernel) -> Result<(), FieldError> {
    if let Kernel::Gaussian { fwhm } = kernel {
        if fwhm.is_empty() {
            return Err(FieldError::InvalidKernel("no FWHM given".into()));
        }
        broadcast_fwhm(fwhm, fwhm.len())?;
    }
    Ok(())
}

fn validate_truncation(truncation: Truncation) -> Result<(), FieldError> {
    if let Truncation::Radius(r) = truncation {
        Validator::validate_truncation(r)?;
    }
    Ok(())
}

// ============================================================================
// t-Field
// ============================================================================

/// Fluent builder for the continuous t-field.
#[derive(Debug, Clone, Default)]
pub struct TFieldBuilder {
    /// Smoothing kernel (required).
    pub kernel: Option<Kernel>,

    /// Support window (default: untruncated).
    pub truncation: Option<Truncation>,

    /// Per-axis coordinates (default: `1..=L` on every axis).
    pub coordinates: Option<Vec<Vec<f64>>>,

    /// Spatial mask (default: all true).
    pub mask: Option<ArrayD<bool>>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub(crate) duplicate_param: Option<&'static str>,
}

impl TFieldBuilder {
    /// Create a new builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the smoothing kernel.
    pub fn kernel(mut self, kernel: impl Into<Kernel>) -> Self {
        if self.kernel.is_some() {
            self.duplicate_param = Some("kernel");
        }
        self.kernel = Some(kernel.into());
        self
    }

    /// Set an isotropic Gaussian kernel by FWHM.
    pub fn fwhm(self, fwhm: f64) -> Self {
        self.kernel(Kernel::fwhm(fwhm))
    }

    /// Set the support window.
    pub fn truncation(mut self, truncation: impl Into<Truncation>) -> Self {
        if self.truncation.is_some() {
            self.duplicate_param = Some("truncation");
        }
        self.truncation = Some(truncation.into());
        self
    }

    /// Set coordinate vectors; missing trailing axes continue the first.
    pub fn coordinates(mut self, coordinates: Vec<Vec<f64>>) -> Self {
        if self.coordinates.is_some() {
            self.duplicate_param = Some("coordinates");
        }
        self.coordinates = Some(coordinates);
        self
    }

    /// Restrict contributions to voxels where `mask` is true.
    pub fn mask(mut self, mask: ArrayD<bool>) -> Self {
        if self.mask.is_some() {
            self.duplicate_param = Some("mask");
        }
        self.mask = Some(mask);
        self
    }

    /// Validate the configuration.
    pub fn build(self) -> Result<TFieldProcessor, FieldError> {
        Validator::validate_no_duplicates(self.duplicate_param)?;
        Validator::validate_required(self.kernel.as_ref(), "kernel")?;

        let kernel = self.kernel.unwrap_or_else(|| Kernel::fwhm(1.0));
        validate_kernel(&kernel)?;
        let truncation = self.truncation.unwrap_or_default();
        validate_truncation(truncation)?;

        Ok(TFieldProcessor {
            kernel,
            truncation,
            coordinates: self.coordinates,
            mask: self.mask,
        })
    }
}

/// Configured continuous t-field evaluator.
#[derive(Debug, Clone)]
pub struct TFieldProcessor {
    kernel: Kernel,
    truncation: Truncation,
    coordinates: Option<Vec<Vec<f64>>>,
    mask: Option<ArrayD<bool>>,
}

impl TFieldProcessor {
    /// Bind lattice data into a continuous field for repeated queries.
    pub fn bind(&self, data: &LatticeField) -> Result<ContinuousTField, FieldError> {
        ContinuousTField::new(
            data,
            &self.kernel,
            self.coordinates.as_deref(),
            self.mask.as_ref(),
            self.truncation,
        )
    }

    /// Evaluate the t-field at the columns of `points` (`D x M`).
    pub fn evaluate(
        &self,
        data: &LatticeField,
        points: &Array2<f64>,
    ) -> Result<TFieldResult, FieldError> {
        self.bind(data)?.evaluate(&points.view())
    }
}

// ============================================================================
// Peaks
// ============================================================================

/// Fluent builder for peak localisation.
#[derive(Debug, Clone, Default)]
pub struct PeakFinderBuilder {
    /// Smoothing kernel (required).
    pub kernel: Option<Kernel>,

    /// Support window (default: untruncated).
    pub truncation: Option<Truncation>,

    /// Per-axis coordinates (default: `1..=L` on every axis).
    pub coordinates: Option<Vec<Vec<f64>>>,

    /// Spatial mask (default: all true).
    pub mask: Option<ArrayD<bool>>,

    /// Seeds (default: the single largest lattice maximum).
    pub seeds: Option<PeakSeeds>,

    /// Refinement strategy (default: root finding).
    pub refinement: Option<Refinement>,

    /// Derivative source (default: finite differences, step `1e-4`).
    pub derivative_method: Option<DerivativeMethod>,

    /// Weight the objective by the smoothed mask (constrained refinement only).
    pub mask_weighted: Option<bool>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub(crate) duplicate_param: Option<&'static str>,
}

impl PeakFinderBuilder {
    /// Create a new builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the smoothing kernel.
    pub fn kernel(mut self, kernel: impl Into<Kernel>) -> Self {
        if self.kernel.is_some() {
            self.duplicate_param = Some("kernel");
        }
        self.kernel = Some(kernel.into());
        self
    }

    /// Set an isotropic Gaussian kernel by FWHM.
    pub fn fwhm(self, fwhm: f64) -> Self {
        self.kernel(Kernel::fwhm(fwhm))
    }

    /// Set the support window.
    pub fn truncation(mut self, truncation: impl Into<Truncation>) -> Self {
        if self.truncation.is_some() {
            self.duplicate_param = Some("truncation");
        }
        self.truncation = Some(truncation.into());
        self
    }

    /// Set coordinate vectors.
    pub fn coordinates(mut self, coordinates: Vec<Vec<f64>>) -> Self {
        if self.coordinates.is_some() {
            self.duplicate_param = Some("coordinates");
        }
        self.coordinates = Some(coordinates);
        self
    }

    /// Set the spatial mask.
    pub fn mask(mut self, mask: ArrayD<bool>) -> Self {
        if self.mask.is_some() {
            self.duplicate_param = Some("mask");
        }
        self.mask = Some(mask);
        self
    }

    /// Set the seeds: a peak count or a `D x K` matrix of starting points.
    pub fn seeds(mut self, seeds: impl Into<PeakSeeds>) -> Self {
        if self.seeds.is_some() {
            self.duplicate_param = Some("seeds");
        }
        self.seeds = Some(seeds.into());
        self
    }

    /// Search for the `k` largest peaks.
    pub fn peaks(self, k: usize) -> Self {
        self.seeds(PeakSeeds::Auto(k))
    }

    /// Set the refinement strategy.
    pub fn refinement(mut self, refinement: Refinement) -> Self {
        if self.refinement.is_some() {
            self.duplicate_param = Some("refinement");
        }
        self.refinement = Some(refinement);
        self
    }

    /// Set how gradients and Hessians are obtained.
    pub fn derivative_method(mut self, method: DerivativeMethod) -> Self {
        if self.derivative_method.is_some() {
            self.duplicate_param = Some("derivative_method");
        }
        self.derivative_method = Some(method);
        self
    }

    /// Maximise `t(x) * m(x)` instead of `t(x)` under constrained refinement.
    ///
    /// Root finding has no weighted form; `build()` rejects `true` there.
    pub fn mask_weighted(mut self, weighted: bool) -> Self {
        if self.mask_weighted.is_some() {
            self.duplicate_param = Some("mask_weighted");
        }
        self.mask_weighted = Some(weighted);
        self
    }

    /// Validate the configuration.
    pub fn build(self) -> Result<PeakFinder, FieldError> {
        Validator::validate_no_duplicates(self.duplicate_param)?;
        Validator::validate_required(self.kernel.as_ref(), "kernel")?;

        let kernel = self.kernel.unwrap_or_else(|| Kernel::fwhm(1.0));
        validate_kernel(&kernel)?;
        let truncation = self.truncation.unwrap_or_default();
        validate_truncation(truncation)?;

        let seeds = self.seeds.unwrap_or_default();
        if let PeakSeeds::Auto(k) = seeds {
            Validator::validate_peak_count(k)?;
        }

        let derivative_method = self.derivative_method.unwrap_or_default();
        if let DerivativeMethod::FiniteDifference { step } = derivative_method {
            Validator::validate_step(step)?;
        }

        let refinement = self.refinement.unwrap_or_default();
        let mask_weighted = self.mask_weighted.unwrap_or(false);
        if mask_weighted && refinement == Refinement::RootFinding {
            return Err(FieldError::InvalidParameter {
                parameter: "mask_weighted",
                reason: "mask weighting requires constrained refinement".to_string(),
            });
        }

        Ok(PeakFinder {
            kernel,
            truncation,
            coordinates: self.coordinates,
            mask: self.mask,
            seeds,
            refinement,
            derivative_method,
            mask_weighted,
        })
    }
}

/// Configured peak localiser.
#[derive(Debug, Clone)]
pub struct PeakFinder {
    kernel: Kernel,
    truncation: Truncation,
    coordinates: Option<Vec<Vec<f64>>>,
    mask: Option<ArrayD<bool>>,
    seeds: PeakSeeds,
    refinement: Refinement,
    derivative_method: DerivativeMethod,
    mask_weighted: bool,
}

impl PeakFinder {
    /// Locate peaks of the continuous t-field of `data`.
    pub fn find(&self, data: &LatticeField) -> Result<PeakResult, FieldError> {
        let field = ContinuousTField::with_operation(
            data,
            &self.kernel,
            self.coordinates.as_deref(),
            self.mask.as_ref(),
            self.truncation,
            "peak localisation",
        )?;
        let seeds = resolve_seeds(data, &field, &self.seeds)?;

        match self.refinement {
            Refinement::RootFinding => {
                let objective = Objective::new(&field, self.derivative_method, false);
                refine_all(&objective, &seeds, &RootFindingRefiner::default())
            }
            Refinement::Constrained => {
                let objective = Objective::new(&field, self.derivative_method, self.mask_weighted);
                refine_all(&objective, &seeds, &ConstrainedRefiner::default())
            }
        }
    }
}

// ============================================================================
// LKC
// ============================================================================

/// Fluent builder for LKC estimation.
#[derive(Debug, Clone, Default)]
pub struct LkcBuilder {
    /// Gaussian FWHM, one value or one per axis (required).
    pub fwhm: Option<Vec<f64>>,

    /// Extra fine points between lattice points (default: 0).
    pub res_add: Option<usize>,

    /// Lattice units trimmed from each edge (default: 0).
    pub remove: Option<usize>,

    /// Also compute white-noise curvatures (default: false).
    pub theory: Option<bool>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub(crate) duplicate_param: Option<&'static str>,
}

impl LkcBuilder {
    /// Create a new builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an isotropic FWHM.
    pub fn fwhm(self, fwhm: f64) -> Self {
        self.anisotropic_fwhm(vec![fwhm])
    }

    /// Set one FWHM per axis.
    pub fn anisotropic_fwhm(mut self, fwhm: Vec<f64>) -> Self {
        if self.fwhm.is_some() {
            self.duplicate_param = Some("fwhm");
        }
        self.fwhm = Some(fwhm);
        self
    }

    /// Set the number of fine points inserted between lattice points.
    pub fn res_add(mut self, res_add: usize) -> Self {
        if self.res_add.is_some() {
            self.duplicate_param = Some("res_add");
        }
        self.res_add = Some(res_add);
        self
    }

    /// Set the number of lattice units trimmed from each edge.
    pub fn remove(mut self, remove: usize) -> Self {
        if self.remove.is_some() {
            self.duplicate_param = Some("remove");
        }
        self.remove = Some(remove);
        self
    }

    /// Also compute the curvatures of smoothed unit white noise.
    pub fn theory(mut self, theory: bool) -> Self {
        if self.theory.is_some() {
            self.duplicate_param = Some("theory");
        }
        self.theory = Some(theory);
        self
    }

    /// Validate the configuration.
    pub fn build(self) -> Result<LkcEstimator, FieldError> {
        Validator::validate_no_duplicates(self.duplicate_param)?;
        Validator::validate_required(self.fwhm.as_ref(), "fwhm")?;

        let fwhm = self.fwhm.unwrap_or_default();
        validate_kernel(&Kernel::anisotropic(fwhm.clone()))?;

        Ok(LkcEstimator {
            config: LkcConfig {
                fwhm,
                res_add: self.res_add.unwrap_or(0),
                remove: self.remove.unwrap_or(0),
                theory: self.theory.unwrap_or(false),
            },
        })
    }
}

/// Configured LKC estimator.
#[derive(Debug, Clone)]
pub struct LkcEstimator {
    config: LkcConfig,
}

impl LkcEstimator {
    /// Estimation parameters.
    pub fn config(&self) -> &LkcConfig {
        &self.config
    }

    /// Estimate the LKCs of `data`.
    pub fn estimate(&self, data: &LatticeField) -> Result<LkcResult, FieldError> {
        estimate_lkc(data, &self.config)
    }
}
