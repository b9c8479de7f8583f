//! Continuous one-sample t-field.
//!
//! ## Purpose
//!
//! Binds lattice data, a kernel, coordinates, a mask and a truncation window
//! into a continuous t-statistic field that can be evaluated, and
//! differentiated, at arbitrary points of the domain.
//!
//! ## Design notes
//!
//! * **Validated once**: Construction validates every input; evaluation only
//!   checks query points.
//! * **Analytic derivatives**: `derivatives_at` differentiates the t-statistic
//!   through the mean and variance of the subject fields, using the kernel's
//!   gradient and Hessian.
//! * **Mask weighting**: `m(x)` is the mask indicator convolved with the same
//!   kernel and window, used by the constrained peak refiner.
//!
//! ## Key concepts
//!
//! With `q = (s^2)^(-1/2)` and `c = sqrt(n)`:
//!
//! ```text
//! t       = c * m * q
//! d_a t   = c * (d_a m * q - m q^3 d_a s2 / 2)
//! d_ab t  = c * (d_ab m q - (d_a m d_b s2 + d_b m d_a s2) q^3 / 2
//!                + 3/4 m q^5 d_a s2 d_b s2 - m q^3 d_ab s2 / 2)
//! ```
//!
//! ## Invariants
//!
//! * Zero-variance points never panic; they produce `±inf` or `NaN`.

// External dependencies
use ndarray::{s, Array1, Array2, ArrayD, ArrayView2};
use tracing::debug;

// Internal dependencies
use crate::algorithms::convolution::{ConvolutionField, Truncation};
use crate::engine::output::TFieldResult;
use crate::engine::validator::Validator;
use crate::math::kernel::Kernel;
use crate::math::stats::{summarize, t_stat};
use crate::primitives::coords::CoordinateVectors;
use crate::primitives::errors::FieldError;
use crate::primitives::lattice::{full_mask, LatticeField};

// ============================================================================
// Derivative Output
// ============================================================================

/// Value, gradient and Hessian of a scalar field at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDerivatives {
    /// Field value.
    pub value: f64,
    /// Gradient, one entry per axis.
    pub gradient: Vec<f64>,
    /// Hessian, `D x D`.
    pub hessian: Array2<f64>,
}

// ============================================================================
// Continuous t-Field
// ============================================================================

/// A validated continuous t-field over a multi-subject lattice.
#[derive(Debug, Clone)]
pub struct ContinuousTField {
    field: ConvolutionField,
    voxels: Array2<f64>,
    mask_indicator: Array2<f64>,
}

impl ContinuousTField {
    /// Validate the inputs and bind them into a continuous field.
    pub fn new(
        data: &LatticeField,
        kernel: &Kernel,
        coords: Option<&[Vec<f64>]>,
        mask: Option<&ArrayD<bool>>,
        truncation: Truncation,
    ) -> Result<Self, FieldError> {
        Self::with_operation(data, kernel, coords, mask, truncation, "continuous t-field")
    }

    /// As [`ContinuousTField::new`], naming `operation` in dimension errors.
    pub fn with_operation(
        data: &LatticeField,
        kernel: &Kernel,
        coords: Option<&[Vec<f64>]>,
        mask: Option<&ArrayD<bool>>,
        truncation: Truncation,
        operation: &'static str,
    ) -> Result<Self, FieldError> {
        Validator::validate_lattice(data, operation)?;
        let shape = data.spatial_shape();

        let coords = CoordinateVectors::resolve(coords, shape)?;
        Validator::validate_mask(mask, shape)?;
        if let Truncation::Radius(r) = truncation {
            Validator::validate_truncation(r)?;
        }

        let kernel = kernel.resolve(data.dim())?;
        let mask = mask.cloned().unwrap_or_else(|| full_mask(shape));
        let mask_indicator = Array2::from_shape_vec(
            (data.n_voxels(), 1),
            mask.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect(),
        )
        .map_err(|e| FieldError::InvalidInput(e.to_string()))?;

        Ok(Self {
            field: ConvolutionField::new(kernel, coords, mask, truncation),
            voxels: data.voxels().to_owned(),
            mask_indicator,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of spatial dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.field.dim()
    }

    /// Number of subjects.
    #[inline]
    pub fn nsubj(&self) -> usize {
        self.voxels.ncols()
    }

    /// Underlying convolution field.
    #[inline]
    pub fn field(&self) -> &ConvolutionField {
        &self.field
    }

    /// Resolved coordinate vectors.
    #[inline]
    pub fn coords(&self) -> &CoordinateVectors {
        self.field.coords()
    }

    /// Spatial mask.
    #[inline]
    pub fn mask(&self) -> &ArrayD<bool> {
        self.field.mask()
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate the t-field and its summaries at the columns of `points`.
    pub fn evaluate(&self, points: &ArrayView2<'_, f64>) -> Result<TFieldResult, FieldError> {
        Validator::validate_query_points(points, self.dim())?;

        let subject_values = self.field.evaluate(points, &self.voxels.view());
        let stats = t_stat(subject_values.view());

        let degenerate: Vec<usize> = stats
            .sd
            .iter()
            .enumerate()
            .filter(|(_, &sd)| sd == 0.0)
            .map(|(j, _)| j)
            .collect();
        if !degenerate.is_empty() {
            debug!(
                count = degenerate.len(),
                first = degenerate[0],
                "t-field has zero variance at some query points"
            );
        }

        Ok(TFieldResult {
            tstat: stats.tstat,
            mean: stats.mean,
            sd: stats.sd,
            cohens_d: stats.cohens_d,
            subject_values,
            degenerate,
        })
    }

    /// Subject field values at one point.
    pub fn subject_values_at(&self, x: &[f64]) -> Vec<f64> {
        self.field.value_at(x, &self.voxels.view())
    }

    /// t-statistic at one point.
    pub fn t_at(&self, x: &[f64]) -> f64 {
        summarize(Array1::from(self.subject_values_at(x)).view()).tstat
    }

    /// Smoothed mask `m(x)` at one point.
    pub fn mask_weight_at(&self, x: &[f64]) -> f64 {
        self.field.value_at(x, &self.mask_indicator.view())[0]
    }

    /// `t(x) * m(x)`.
    pub fn weighted_t_at(&self, x: &[f64]) -> f64 {
        self.t_at(x) * self.mask_weight_at(x)
    }

    // ========================================================================
    // Analytic Derivatives
    // ========================================================================

    /// Value, gradient and Hessian of the t-field at one point.
    pub fn derivatives_at(&self, x: &[f64]) -> FieldDerivatives {
        let d = self.dim();
        let voxels = self.voxels.view();
        let y = self.field.value_at(x, &voxels);
        let dy = self.field.gradient_at(x, &voxels);
        let d2y = self.field.hessian_at(x, &voxels);

        let n = y.len() as f64;
        let c = n.sqrt();

        let m = y.iter().sum::<f64>() / n;
        let dm: Vec<f64> = (0..d).map(|a| dy.row(a).sum() / n).collect();
        let d2m: Vec<Vec<f64>> = (0..d)
            .map(|a| (0..d).map(|b| d2y.slice(s![a, b, ..]).sum() / n).collect())
            .collect();

        let centred: Vec<f64> = y.iter().map(|v| v - m).collect();
        let s2 = centred.iter().map(|r| r * r).sum::<f64>() / (n - 1.0);

        let ds2: Vec<f64> = (0..d)
            .map(|a| {
                2.0 / (n - 1.0)
                    * centred
                        .iter()
                        .enumerate()
                        .map(|(s, r)| r * (dy[[a, s]] - dm[a]))
                        .sum::<f64>()
            })
            .collect();

        let q = s2.powf(-0.5);
        let q3 = q * q * q;
        let q5 = q3 * q * q;

        let value = c * m * q;
        let gradient: Vec<f64> = (0..d)
            .map(|a| c * (dm[a] * q - 0.5 * m * q3 * ds2[a]))
            .collect();

        let mut hessian = Array2::<f64>::zeros((d, d));
        for a in 0..d {
            for b in a..d {
                let d2s2 = 2.0 / (n - 1.0)
                    * centred
                        .iter()
                        .enumerate()
                        .map(|(s, r)| {
                            (dy[[b, s]] - dm[b]) * (dy[[a, s]] - dm[a])
                                + r * (d2y[[a, b, s]] - d2m[a][b])
                        })
                        .sum::<f64>();

                let h = c
                    * (d2m[a][b] * q
                        - 0.5 * dm[a] * q3 * ds2[b]
                        - 0.5 * dm[b] * q3 * ds2[a]
                        + 0.75 * m * q5 * ds2[a] * ds2[b]
                        - 0.5 * m * q3 * d2s2);
                hessian[[a, b]] = h;
                hessian[[b, a]] = h;
            }
        }

        FieldDerivatives {
            value,
            gradient,
            hessian,
        }
    }

    /// Value, gradient and Hessian of the smoothed mask at one point.
    pub fn mask_derivatives_at(&self, x: &[f64]) -> FieldDerivatives {
        let d = self.dim();
        let ones = self.mask_indicator.view();
        let value = self.field.value_at(x, &ones)[0];
        let gradient = self.field.gradient_at(x, &ones).column(0).to_vec();
        let hess = self.field.hessian_at(x, &ones);
        let hessian = Array2::from_shape_fn((d, d), |(a, b)| hess[[a, b, 0]]);

        FieldDerivatives {
            value,
            gradient,
            hessian,
        }
    }

    /// Value, gradient and Hessian of `t(x) * m(x)` by the product rule.
    pub fn weighted_derivatives_at(&self, x: &[f64]) -> FieldDerivatives {
        let t = self.derivatives_at(x);
        let w = self.mask_derivatives_at(x);
        let d = self.dim();

        let gradient = (0..d)
            .map(|a| t.gradient[a] * w.value + t.value * w.gradient[a])
            .collect();
        let hessian = Array2::from_shape_fn((d, d), |(a, b)| {
            t.hessian[[a, b]] * w.value
                + t.gradient[a] * w.gradient[b]
                + t.gradient[b] * w.gradient[a]
                + t.value * w.hessian[[a, b]]
        });

        FieldDerivatives {
            value: t.value * w.value,
            gradient,
            hessian,
        }
    }
}
