//! Input validation for convolution-field operations.
//!
//! ## Purpose
//!
//! This module provides the validation functions run once at the entry of
//! every operation: lattice shape and finiteness, dimensionality, masks,
//! query points, seeds and configuration parameters.
//!
//! ## Design notes
//!
//! * **Fail-Fast**: Validation stops at the first error encountered.
//! * **Efficiency**: Checks are ordered from cheap to expensive.
//! * **Named operations**: Dimension errors carry the operation name so the
//!   caller knows which path is unimplemented.
//!
//! ## Invariants
//!
//! * Validation logic is deterministic and side-effect free.
//!
//! ## Non-goals
//!
//! * This module does not impute or drop invalid data.

// External dependencies
use ndarray::{ArrayD, ArrayView2};

// Internal dependencies
use crate::primitives::errors::FieldError;
use crate::primitives::lattice::LatticeField;

/// Largest supported number of spatial dimensions.
pub const MAX_DIM: usize = 3;

// ============================================================================
// Validator
// ============================================================================

/// Validation utility for lattice data and configuration.
pub struct Validator;

impl Validator {
    // ========================================================================
    // Lattice Validation
    // ========================================================================

    /// Validate the number of spatial dimensions for an operation.
    pub fn validate_dimension(dim: usize, operation: &'static str) -> Result<(), FieldError> {
        if dim == 0 || dim > MAX_DIM {
            return Err(FieldError::UnsupportedDimension {
                dim,
                max: MAX_DIM,
                operation,
            });
        }
        Ok(())
    }

    /// Validate lattice data: dimensionality, subject count, then finiteness.
    pub fn validate_lattice(
        data: &LatticeField,
        operation: &'static str,
    ) -> Result<(), FieldError> {
        Self::validate_dimension(data.dim(), operation)?;

        if data.nsubj() < 2 {
            return Err(FieldError::TooFewSubjects {
                got: data.nsubj(),
                min: 2,
            });
        }

        if let Some(index) = data.view().iter().position(|v| !v.is_finite()) {
            return Err(FieldError::MissingValues { index });
        }

        Ok(())
    }

    /// Validate (or default) a mask against the lattice's spatial shape.
    pub fn validate_mask(
        mask: Option<&ArrayD<bool>>,
        spatial_shape: &[usize],
    ) -> Result<(), FieldError> {
        if let Some(mask) = mask {
            if mask.shape() != spatial_shape {
                return Err(FieldError::ShapeMismatch {
                    what: "mask",
                    expected: format!("{spatial_shape:?}"),
                    got: format!("{:?}", mask.shape()),
                });
            }
        }
        Ok(())
    }

    /// Validate a `D x M` query-point matrix.
    pub fn validate_query_points(
        points: &ArrayView2<'_, f64>,
        dim: usize,
    ) -> Result<(), FieldError> {
        if points.nrows() != dim {
            return Err(FieldError::ShapeMismatch {
                what: "query points",
                expected: format!("{dim} rows (one per axis)"),
                got: format!("{} rows", points.nrows()),
            });
        }
        if let Some(((r, c), v)) = points.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(FieldError::InvalidNumericValue(format!(
                "points[{r}, {c}]={v}"
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Parameter Validation
    // ========================================================================

    /// Validate an explicit truncation radius.
    pub fn validate_truncation(radius: f64) -> Result<(), FieldError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(FieldError::InvalidParameter {
                parameter: "truncation",
                reason: format!("radius must be finite and > 0, got {radius}"),
            });
        }
        Ok(())
    }

    /// Validate a finite-difference step.
    pub fn validate_step(step: f64) -> Result<(), FieldError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(FieldError::InvalidParameter {
                parameter: "step",
                reason: format!("must be finite and > 0, got {step}"),
            });
        }
        Ok(())
    }

    /// Validate the requested number of auto-detected peaks.
    pub fn validate_peak_count(k: usize) -> Result<(), FieldError> {
        if k == 0 {
            return Err(FieldError::InvalidParameter {
                parameter: "peaks",
                reason: "at least one peak must be requested".into(),
            });
        }
        Ok(())
    }

    /// Validate that a required parameter was provided.
    pub fn validate_required<T>(value: Option<&T>, parameter: &'static str) -> Result<(), FieldError> {
        if value.is_none() {
            return Err(FieldError::InvalidParameter {
                parameter,
                reason: "must be provided".into(),
            });
        }
        Ok(())
    }

    /// Validate that no parameters were set multiple times in the builder.
    pub fn validate_no_duplicates(
        duplicate_param: Option<&'static str>,
    ) -> Result<(), FieldError> {
        if let Some(param) = duplicate_param {
            return Err(FieldError::DuplicateParameter { parameter: param });
        }
        Ok(())
    }
}
