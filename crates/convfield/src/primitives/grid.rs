//! Fine-grid construction for resolution increase.
//!
//! ## Purpose
//!
//! Upsamples lattice data by zero insertion and trims boundary samples from
//! fine-grid fields. Used by the LKC estimator so that a discrete
//! convolution on the fine grid evaluates the convolution field between
//! original lattice points.
//!
//! ## Key concepts
//!
//! * **Zero insertion**: With `res_add` extra points per gap, original sample
//!   `i` lands at fine index `i * (res_add + 1)`; every other fine sample is 0.
//! * **Fine spacing**: `dx = 1 / (res_add + 1)` in lattice units.
//!
//! ## Invariants
//!
//! * An axis of length `L` becomes `(L - 1) * (res_add + 1) + 1` fine samples.
//! * Axes at or beyond `spatial_axes` (e.g. the subject axis) are untouched.

// External dependencies
use ndarray::{ArrayD, ArrayViewD, IxDyn, Slice};

// Internal dependencies
use crate::primitives::errors::FieldError;

/// Fine-grid spacing in lattice units.
#[inline]
pub fn fine_spacing(res_add: usize) -> f64 {
    1.0 / (res_add + 1) as f64
}

/// Length of an axis after zero-insert upsampling.
#[inline]
pub fn upsampled_len(len: usize, res_add: usize) -> usize {
    (len - 1) * (res_add + 1) + 1
}

/// Zero-insert upsample the first `spatial_axes` axes of `data`.
pub fn upsample_zero_insert(
    data: &ArrayViewD<'_, f64>,
    res_add: usize,
    spatial_axes: usize,
) -> ArrayD<f64> {
    if res_add == 0 {
        return data.to_owned();
    }

    let shape: Vec<usize> = data
        .shape()
        .iter()
        .enumerate()
        .map(|(d, &len)| {
            if d < spatial_axes {
                upsampled_len(len, res_add)
            } else {
                len
            }
        })
        .collect();

    let step = (res_add + 1) as isize;
    let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));
    out.slice_each_axis_mut(|ax| {
        if ax.axis.index() < spatial_axes {
            Slice::new(0, None, step)
        } else {
            Slice::from(..)
        }
    })
    .assign(data);
    out
}

/// Remove `n` samples from both ends of the first `spatial_axes` axes.
pub fn trim_edges(
    field: &ArrayD<f64>,
    n: usize,
    spatial_axes: usize,
) -> Result<ArrayD<f64>, FieldError> {
    if n == 0 {
        return Ok(field.clone());
    }

    for (d, &len) in field.shape().iter().take(spatial_axes).enumerate() {
        if 2 * n >= len {
            return Err(FieldError::InvalidInput(format!(
                "trimming {n} samples from each edge of axis {d} (length {len}) leaves no domain"
            )));
        }
    }

    let n = n as isize;
    Ok(field
        .slice_each_axis(|ax| {
            if ax.axis.index() < spatial_axes {
                Slice::new(n, Some(-n), 1)
            } else {
                Slice::from(..)
            }
        })
        .to_owned())
}

/// Fine-grid coordinates `0, dx, 2dx, ..` for an axis of `len` samples.
pub fn fine_axis(len: usize, dx: f64) -> Vec<f64> {
    (0..len).map(|k| k as f64 * dx).collect()
}
