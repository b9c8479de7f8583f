//! Continuous convolution-field evaluation.
//!
//! ## Purpose
//!
//! Evaluates the kernel-weighted sum of lattice samples at arbitrary real
//! coordinates:
//!
//! ```text
//! Y_s(x) = sum_{v in mask, |x_d - c_d(v)| <= r} K(x - c(v)) * Y_s(v)
//! ```
//!
//! together with its gradient and Hessian, using the kernel's derivatives.
//!
//! ## Design notes
//!
//! * **Shared weights**: The weight of each voxel depends only on the query
//!   point, so it is computed once and applied to every subject column of the
//!   voxel matrix.
//! * **Separable window**: The truncation window is a box, so the candidate
//!   voxels are the Cartesian product of per-axis candidate indices.
//! * **Parallelism**: With the `parallel` feature, query points are evaluated
//!   with rayon; results are collected in input order.
//!
//! ## Invariants
//!
//! * Output row `j` corresponds to query column `j`.
//! * Masked-out voxels never contribute.
//!
//! ## Non-goals
//!
//! * This module does not validate shapes; the engine does that first.

// Feature-gated imports
#[cfg(feature = "parallel")]
use rayon::prelude::*;

// External dependencies
use ndarray::{Array2, Array3, ArrayD, ArrayView2};

// Internal dependencies
use crate::math::kernel::ResolvedKernel;
use crate::primitives::coords::CoordinateVectors;
use crate::primitives::lattice::row_major_strides;

// ============================================================================
// Truncation
// ============================================================================

/// Support window used when summing kernel contributions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Truncation {
    /// Every lattice point contributes.
    #[default]
    None,

    /// Only points within this per-axis distance contribute.
    Radius(f64),

    /// Radius derived from the kernel's spread (4 sigma for Gaussians).
    KernelDefault,
}

impl From<f64> for Truncation {
    /// `0` means no truncation and a negative value means the kernel default.
    fn from(r: f64) -> Self {
        if r == 0.0 {
            Truncation::None
        } else if r < 0.0 {
            Truncation::KernelDefault
        } else {
            Truncation::Radius(r)
        }
    }
}

impl Truncation {
    /// Concrete radius for a resolved kernel, `None` meaning untruncated.
    pub fn radius(&self, kernel: &ResolvedKernel) -> Option<f64> {
        match *self {
            Truncation::None => None,
            Truncation::Radius(r) => Some(r),
            Truncation::KernelDefault => kernel.spread(),
        }
    }
}

// ============================================================================
// Convolution Field
// ============================================================================

/// Kernel, coordinates, mask and window bound to one lattice geometry.
#[derive(Debug, Clone)]
pub struct ConvolutionField {
    kernel: ResolvedKernel,
    coords: CoordinateVectors,
    mask: ArrayD<bool>,
    mask_flat: Vec<bool>,
    radius: Option<f64>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl ConvolutionField {
    /// Bind a kernel to a lattice geometry.
    ///
    /// `mask` must already have the spatial shape of `coords`.
    pub fn new(
        kernel: ResolvedKernel,
        coords: CoordinateVectors,
        mask: ArrayD<bool>,
        truncation: Truncation,
    ) -> Self {
        let shape: Vec<usize> = (0..coords.dim()).map(|d| coords.axis(d).len()).collect();
        let strides = row_major_strides(&shape);
        let radius = truncation.radius(&kernel);
        let mask_flat = mask.iter().copied().collect();
        Self {
            kernel,
            coords,
            mask,
            mask_flat,
            radius,
            shape,
            strides,
        }
    }

    /// Number of spatial dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    /// Resolved kernel.
    #[inline]
    pub fn kernel(&self) -> &ResolvedKernel {
        &self.kernel
    }

    /// Coordinate vectors.
    #[inline]
    pub fn coords(&self) -> &CoordinateVectors {
        &self.coords
    }

    /// Spatial mask.
    #[inline]
    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    /// Effective truncation radius.
    #[inline]
    pub fn radius(&self) -> Option<f64> {
        self.radius
    }

    /// Visit every contributing voxel with its flat index and offset `x - c(v)`.
    pub fn for_each_support<F>(&self, point: &[f64], mut visit: F)
    where
        F: FnMut(usize, &[f64]),
    {
        let d = self.dim();

        // Per-axis candidates: (index, offset along the axis)
        let candidates: Vec<Vec<(usize, f64)>> = (0..d)
            .map(|axis| {
                self.coords
                    .axis(axis)
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| (i, point[axis] - c))
                    .filter(|&(_, off)| self.radius.map_or(true, |r| off.abs() <= r))
                    .collect()
            })
            .collect();

        if candidates.iter().any(|c| c.is_empty()) {
            return;
        }

        // Odometer over the Cartesian product of candidates
        let mut cursor = vec![0usize; d];
        let mut offset = vec![0.0; d];
        loop {
            let mut flat = 0;
            for axis in 0..d {
                let (i, off) = candidates[axis][cursor[axis]];
                flat += i * self.strides[axis];
                offset[axis] = off;
            }
            if self.mask_flat[flat] {
                visit(flat, &offset);
            }

            let mut axis = d;
            loop {
                if axis == 0 {
                    return;
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < candidates[axis].len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }

    /// Field value of every subject at one point.
    pub fn value_at(&self, point: &[f64], voxels: &ArrayView2<'_, f64>) -> Vec<f64> {
        let mut out = vec![0.0; voxels.ncols()];
        self.for_each_support(point, |flat, u| {
            let w = self.kernel.value(u);
            if w != 0.0 {
                for (o, &y) in out.iter_mut().zip(voxels.row(flat)) {
                    *o += w * y;
                }
            }
        });
        out
    }

    /// Field gradient of every subject at one point, shape `D x nsubj`.
    pub fn gradient_at(&self, point: &[f64], voxels: &ArrayView2<'_, f64>) -> Array2<f64> {
        let d = self.dim();
        let mut out = Array2::<f64>::zeros((d, voxels.ncols()));
        self.for_each_support(point, |flat, u| {
            let g = self.kernel.gradient(u);
            let row = voxels.row(flat);
            for a in 0..d {
                for (s, &y) in row.iter().enumerate() {
                    out[[a, s]] += g[a] * y;
                }
            }
        });
        out
    }

    /// Field Hessian of every subject at one point, shape `D x D x nsubj`.
    pub fn hessian_at(&self, point: &[f64], voxels: &ArrayView2<'_, f64>) -> Array3<f64> {
        let d = self.dim();
        let mut out = Array3::<f64>::zeros((d, d, voxels.ncols()));
        self.for_each_support(point, |flat, u| {
            let h = self.kernel.hessian(u);
            let row = voxels.row(flat);
            for a in 0..d {
                for b in 0..d {
                    for (s, &y) in row.iter().enumerate() {
                        out[[a, b, s]] += h[a][b] * y;
                    }
                }
            }
        });
        out
    }

    /// Evaluate every subject at every query column; shape `M x nsubj`.
    pub fn evaluate(&self, points: &ArrayView2<'_, f64>, voxels: &ArrayView2<'_, f64>) -> Array2<f64> {
        let m = points.ncols();
        let nsubj = voxels.ncols();

        #[cfg(feature = "parallel")]
        let rows: Vec<Vec<f64>> = (0..m)
            .into_par_iter()
            .map(|j| self.value_at(&points.column(j).to_vec(), voxels))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let rows: Vec<Vec<f64>> = (0..m)
            .map(|j| self.value_at(&points.column(j).to_vec(), voxels))
            .collect();

        let mut out = Array2::<f64>::zeros((m, nsubj));
        for (j, row) in rows.into_iter().enumerate() {
            for (s, v) in row.into_iter().enumerate() {
                out[[j, s]] = v;
            }
        }
        out
    }
}
