//! Separable discrete convolution on the fine grid.
//!
//! ## Purpose
//!
//! Smooths zero-inserted fine-grid data with sampled 1-D kernels, one axis at
//! a time. Used by the LKC estimator to obtain the smoothed field and its
//! partial-derivative fields, and by its theory path to obtain exact
//! covariances of smoothed white noise.
//!
//! ## Design notes
//!
//! * **Separable**: A product kernel `prod_d k_d(u_d)` is applied as one 1-D
//!   convolution per axis. `d/du_i` of the product only swaps the factor on
//!   axis `i` for its derivative, so derivative fields use the same routine.
//! * **Full support, cropped**: Output sample `p` sums `data[p - j] * k[j + H]`
//!   over every in-range `j`, i.e. the full convolution cropped to the
//!   input's extent. Every input sample contributes to every output within
//!   reach of the kernel.
//!
//! ## Invariants
//!
//! * Sampled kernels have odd length `2H + 1`; index `H` is offset 0.
//! * Axes beyond the number of supplied kernels (e.g. subjects) are untouched.

// External dependencies
use ndarray::{ArrayD, ArrayViewD, Axis, Zip};

// Internal dependencies
use crate::math::kernel::{gaussian_1d, gaussian_1d_derivative, KERNEL_SUPPORT_SIGMAS};

// ============================================================================
// Kernel Sampling
// ============================================================================

/// A 1-D Gaussian and its derivative sampled on a fine grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledKernel {
    /// `k(j * dx)` for `j` in `-H..=H`.
    pub value: Vec<f64>,
    /// `k'(j * dx)` for `j` in `-H..=H`.
    pub derivative: Vec<f64>,
    /// Half-width `H` in fine samples.
    pub half_width: usize,
}

impl SampledKernel {
    /// Sample a Gaussian on `ceil(4 sigma)` lattice units each side at spacing `dx`.
    pub fn gaussian(sigma: f64, res_add: usize) -> Self {
        let step = res_add + 1;
        let dx = 1.0 / step as f64;
        let half_units = (KERNEL_SUPPORT_SIGMAS * sigma).ceil() as usize;
        let half_width = half_units * step;

        let offsets = (0..=2 * half_width).map(|j| (j as f64 - half_width as f64) * dx);
        let value = offsets.clone().map(|u| gaussian_1d(u, sigma)).collect();
        let derivative = offsets.map(|u| gaussian_1d_derivative(u, sigma)).collect();

        Self {
            value,
            derivative,
            half_width,
        }
    }

    /// `k^2`.
    pub fn squared(&self) -> Vec<f64> {
        self.value.iter().map(|v| v * v).collect()
    }

    /// `k'^2`.
    pub fn derivative_squared(&self) -> Vec<f64> {
        self.derivative.iter().map(|v| v * v).collect()
    }

    /// `k * k'`.
    pub fn value_times_derivative(&self) -> Vec<f64> {
        self.value
            .iter()
            .zip(&self.derivative)
            .map(|(a, b)| a * b)
            .collect()
    }
}

// ============================================================================
// Convolution
// ============================================================================

/// Convolve `data` along one axis with an odd-length kernel, cropped to the input extent.
pub fn convolve_axis(data: &ArrayViewD<'_, f64>, axis: usize, kernel: &[f64]) -> ArrayD<f64> {
    let half = (kernel.len() / 2) as isize;
    let mut out = ArrayD::<f64>::zeros(data.raw_dim());

    Zip::from(out.lanes_mut(Axis(axis)))
        .and(data.lanes(Axis(axis)))
        .for_each(|mut o, x| {
            let n = x.len() as isize;
            for p in 0..n {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let q = p - (k as isize - half);
                    if q >= 0 && q < n {
                        acc += x[q as usize] * w;
                    }
                }
                o[p as usize] = acc;
            }
        });
    out
}

/// Apply `kernels[d]` along axis `d` for every supplied kernel.
pub fn separable_convolve(data: &ArrayViewD<'_, f64>, kernels: &[&[f64]]) -> ArrayD<f64> {
    let mut current = data.to_owned();
    for (axis, kernel) in kernels.iter().enumerate() {
        current = convolve_axis(&current.view(), axis, kernel);
    }
    current
}

/// Smoothed field: every axis uses the kernel value.
pub fn smooth(data: &ArrayViewD<'_, f64>, kernels: &[SampledKernel]) -> ArrayD<f64> {
    let taps: Vec<&[f64]> = kernels.iter().map(|k| k.value.as_slice()).collect();
    separable_convolve(data, &taps)
}

/// Partial-derivative field along `axis`.
pub fn smooth_derivative(
    data: &ArrayViewD<'_, f64>,
    kernels: &[SampledKernel],
    axis: usize,
) -> ArrayD<f64> {
    let taps: Vec<&[f64]> = kernels
        .iter()
        .enumerate()
        .map(|(d, k)| {
            if d == axis {
                k.derivative.as_slice()
            } else {
                k.value.as_slice()
            }
        })
        .collect();
    separable_convolve(data, &taps)
}
