//! Multi-subject lattice container.
//!
//! ## Purpose
//!
//! This module provides `LatticeField`, the owned representation of a
//! discretely sampled field with `D` spatial axes followed by a subject axis.
//!
//! ## Design notes
//!
//! * **Layout**: Backed by `ndarray::ArrayD<f64>` of shape `[L1, .., LD, nsubj]`.
//! * **Voxel matrix**: A row-major `nvox x nsubj` copy is kept so that every
//!   convolution sum can share one weight vector across subjects.
//!
//! ## Invariants
//!
//! * There is at least one spatial axis and one subject.
//! * All subjects share the same spatial shape (guaranteed by the array shape).
//! * Row `v` of the voxel matrix is the flat row-major spatial index `v`.
//!
//! ## Non-goals
//!
//! * This module does not check finiteness; see the validator.

// External dependencies
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis, IxDyn};

// Internal dependencies
use crate::primitives::errors::FieldError;

// ============================================================================
// Lattice Field
// ============================================================================

/// A multi-subject field sampled on a regular lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeField {
    /// Samples, shape `[L1, .., LD, nsubj]`.
    data: ArrayD<f64>,

    /// Same samples as an `nvox x nsubj` matrix.
    voxels: Array2<f64>,
}

impl LatticeField {
    /// Wrap an array whose last axis indexes subjects.
    pub fn new(data: ArrayD<f64>) -> Result<Self, FieldError> {
        if data.ndim() < 2 {
            return Err(FieldError::ShapeMismatch {
                what: "lattice field",
                expected: "at least one spatial axis plus a subject axis".into(),
                got: format!("{:?}", data.shape()),
            });
        }
        if data.is_empty() {
            return Err(FieldError::EmptyInput);
        }

        let nsubj = data.shape()[data.ndim() - 1];
        let nvox = data.len() / nsubj;
        let voxels = Array2::from_shape_vec((nvox, nsubj), data.iter().copied().collect())
            .map_err(|e| FieldError::InvalidInput(e.to_string()))?;

        Ok(Self { data, voxels })
    }

    /// Build from a flat row-major buffer with the subject index varying fastest.
    pub fn from_vec(
        spatial_shape: &[usize],
        nsubj: usize,
        values: Vec<f64>,
    ) -> Result<Self, FieldError> {
        let mut shape = spatial_shape.to_vec();
        shape.push(nsubj);
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(FieldError::ShapeMismatch {
                what: "lattice buffer",
                expected: format!("{expected} values for shape {shape:?}"),
                got: format!("{} values", values.len()),
            });
        }
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| FieldError::InvalidInput(e.to_string()))?;
        Self::new(data)
    }

    /// Wrap a single-subject spatial field.
    pub fn single_subject(field: ArrayD<f64>) -> Result<Self, FieldError> {
        let ndim = field.ndim();
        Self::new(field.insert_axis(Axis(ndim)))
    }

    /// Number of spatial dimensions `D`.
    #[inline]
    pub fn dim(&self) -> usize {
        self.data.ndim() - 1
    }

    /// Spatial shape `[L1, .., LD]`.
    #[inline]
    pub fn spatial_shape(&self) -> &[usize] {
        &self.data.shape()[..self.dim()]
    }

    /// Number of subjects.
    #[inline]
    pub fn nsubj(&self) -> usize {
        self.data.shape()[self.dim()]
    }

    /// Number of spatial lattice points.
    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.voxels.nrows()
    }

    /// Full array view, shape `[L1, .., LD, nsubj]`.
    #[inline]
    pub fn view(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    /// Voxel-by-subject matrix view.
    #[inline]
    pub fn voxels(&self) -> ArrayView2<'_, f64> {
        self.voxels.view()
    }

    /// Spatial field of one subject.
    pub fn subject(&self, s: usize) -> ArrayViewD<'_, f64> {
        self.data.index_axis(Axis(self.dim()), s)
    }
}

// ============================================================================
// Index Helpers
// ============================================================================

/// Row-major strides for a spatial shape.
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Convert a flat row-major index into a multi-index.
pub fn unravel_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0usize; shape.len()];
    for d in (0..shape.len()).rev() {
        index[d] = flat % shape[d];
        flat /= shape[d];
    }
    index
}

/// Convert a multi-index into a flat row-major index.
pub fn ravel_index(index: &[usize], shape: &[usize]) -> usize {
    index
        .iter()
        .zip(row_major_strides(shape))
        .map(|(&i, s)| i * s)
        .sum()
}

/// An all-`true` mask over a spatial shape.
pub fn full_mask(shape: &[usize]) -> ArrayD<bool> {
    ArrayD::from_elem(IxDyn(shape), true)
}
