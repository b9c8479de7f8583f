//! Smoothing kernels for convolution fields.
//!
//! ## Purpose
//!
//! This module provides the Gaussian kernel with its analytic gradient and
//! Hessian, and the polymorphic `Kernel` argument accepted by every
//! operation: either a FWHM (isotropic or per-axis Gaussian) or an explicit
//! user function.
//!
//! ## Design notes
//!
//! * **Resolved once**: A `Kernel` is turned into a `ResolvedKernel` at the
//!   entry of each operation. Downstream code only sees the uniform
//!   value/gradient/Hessian triple and never branches on how the kernel was
//!   specified.
//! * **Separable**: The D-dimensional Gaussian is a product of 1-D Gaussians,
//!   which the discrete smoother exploits.
//! * **Fallback derivatives**: An explicit kernel without a supplied gradient or
//!   Hessian is differentiated by forward differences.
//!
//! ## Key concepts
//!
//! * **FWHM**: Full width at half maximum, `sigma = FWHM / sqrt(8 ln 2)`.
//! * **Normalisation**: Each 1-D factor integrates to 1.
//! * **Spread**: `4 * max(sigma)`, used as the kernel-derived truncation radius.
//!
//! ## Invariants
//!
//! * Gaussian kernels are positive and symmetric: K(u) = K(-u).
//! * Every FWHM entry is finite and strictly positive.
//!
//! ## Non-goals
//!
//! * This module does not evaluate convolution sums.

// External dependencies
use core::f64::consts::PI;
use core::fmt::{Debug, Formatter};
use num_traits::Float;
use std::sync::Arc;

// Internal dependencies
use crate::math::derivatives::{make_scalar_derivatives, DEFAULT_STEP};
use crate::primitives::errors::FieldError;

// ============================================================================
// Constants
// ============================================================================

/// Number of standard deviations used as the Gaussian support half-width.
pub const KERNEL_SUPPORT_SIGMAS: f64 = 4.0;

// ============================================================================
// Gaussian Functions
// ============================================================================

/// Convert a full width at half maximum to a Gaussian standard deviation.
#[inline]
pub fn fwhm_to_sigma<T: Float>(fwhm: T) -> T {
    let eight = T::from(8.0).unwrap();
    let two = T::from(2.0).unwrap();
    fwhm / (eight * two.ln()).sqrt()
}

/// Normalised 1-D Gaussian density with standard deviation `sigma`.
#[inline]
pub fn gaussian_1d<T: Float>(u: T, sigma: T) -> T {
    let two = T::from(2.0).unwrap();
    let norm = (two * T::from(PI).unwrap()).sqrt() * sigma;
    (-(u * u) / (two * sigma * sigma)).exp() / norm
}

/// First derivative of [`gaussian_1d`] with respect to `u`.
#[inline]
pub fn gaussian_1d_derivative<T: Float>(u: T, sigma: T) -> T {
    -u / (sigma * sigma) * gaussian_1d(u, sigma)
}

/// Product Gaussian `prod_d N(u_d; 0, sigma_d^2)`.
pub fn gaussian<T: Float>(u: &[T], sigma: &[T]) -> T {
    u.iter()
        .zip(sigma)
        .fold(T::one(), |acc, (&ud, &sd)| acc * gaussian_1d(ud, sd))
}

/// Gradient of [`gaussian`]: `-u_d / sigma_d^2 * K(u)`.
pub fn gaussian_gradient<T: Float>(u: &[T], sigma: &[T]) -> Vec<T> {
    let k = gaussian(u, sigma);
    u.iter()
        .zip(sigma)
        .map(|(&ud, &sd)| -ud / (sd * sd) * k)
        .collect()
}

/// Hessian of [`gaussian`]: `(u_i u_j / (s_i^2 s_j^2) - delta_ij / s_i^2) K(u)`.
pub fn gaussian_hessian<T: Float>(u: &[T], sigma: &[T]) -> Vec<Vec<T>> {
    let k = gaussian(u, sigma);
    let d = u.len();
    let scaled: Vec<T> = (0..d).map(|i| u[i] / (sigma[i] * sigma[i])).collect();

    (0..d)
        .map(|i| {
            (0..d)
                .map(|j| {
                    let diag = if i == j {
                        T::one() / (sigma[i] * sigma[i])
                    } else {
                        T::zero()
                    };
                    (scaled[i] * scaled[j] - diag) * k
                })
                .collect()
        })
        .collect()
}

// ============================================================================
// Kernel Specification
// ============================================================================

/// Kernel value function.
pub type KernelFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Kernel gradient function.
pub type KernelGradientFn = Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// Kernel Hessian function.
pub type KernelHessianFn = Arc<dyn Fn(&[f64]) -> Vec<Vec<f64>> + Send + Sync>;

/// A user-supplied kernel with optional analytic derivatives.
#[derive(Clone)]
pub struct ExplicitKernel {
    value: KernelFn,
    gradient: Option<KernelGradientFn>,
    hessian: Option<KernelHessianFn>,
}

impl ExplicitKernel {
    /// Wrap a kernel function mapping an offset `u = x - v` to a weight.
    pub fn new<F>(value: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            gradient: None,
            hessian: None,
        }
    }

    /// Attach an analytic gradient.
    pub fn with_gradient<G>(mut self, gradient: G) -> Self
    where
        G: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        self.gradient = Some(Arc::new(gradient));
        self
    }

    /// Attach an analytic Hessian.
    pub fn with_hessian<H>(mut self, hessian: H) -> Self
    where
        H: Fn(&[f64]) -> Vec<Vec<f64>> + Send + Sync + 'static,
    {
        self.hessian = Some(Arc::new(hessian));
        self
    }
}

impl Debug for ExplicitKernel {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExplicitKernel")
            .field("gradient", &self.gradient.is_some())
            .field("hessian", &self.hessian.is_some())
            .finish()
    }
}

/// Smoothing kernel: a Gaussian given by FWHM, or an explicit function.
#[derive(Debug, Clone)]
pub enum Kernel {
    /// Gaussian with one FWHM (isotropic) or one FWHM per axis.
    Gaussian {
        /// FWHM values, in lattice units.
        fwhm: Vec<f64>,
    },

    /// User-supplied kernel function.
    Explicit(ExplicitKernel),
}

impl Kernel {
    /// Isotropic Gaussian.
    pub fn fwhm(fwhm: f64) -> Self {
        Kernel::Gaussian { fwhm: vec![fwhm] }
    }

    /// Gaussian with a separate FWHM per axis.
    pub fn anisotropic(fwhm: Vec<f64>) -> Self {
        Kernel::Gaussian { fwhm }
    }

    /// Explicit kernel from a value function.
    pub fn explicit<F>(value: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Kernel::Explicit(ExplicitKernel::new(value))
    }

    /// Name of the kernel family.
    pub const fn name(&self) -> &'static str {
        match self {
            Kernel::Gaussian { .. } => "Gaussian",
            Kernel::Explicit(_) => "Explicit",
        }
    }

    /// Resolve into a uniform value/gradient/Hessian triple for `dim` axes.
    pub fn resolve(&self, dim: usize) -> Result<ResolvedKernel, FieldError> {
        match self {
            Kernel::Gaussian { fwhm } => {
                let fwhm = broadcast_fwhm(fwhm, dim)?;
                Ok(ResolvedKernel {
                    dim,
                    kind: ResolvedKind::Gaussian {
                        sigma: fwhm.into_iter().map(fwhm_to_sigma).collect(),
                    },
                })
            }
            Kernel::Explicit(k) => Ok(ResolvedKernel {
                dim,
                kind: ResolvedKind::Explicit(k.clone()),
            }),
        }
    }
}

impl From<f64> for Kernel {
    fn from(fwhm: f64) -> Self {
        Kernel::fwhm(fwhm)
    }
}

impl From<Vec<f64>> for Kernel {
    fn from(fwhm: Vec<f64>) -> Self {
        Kernel::anisotropic(fwhm)
    }
}

impl From<ExplicitKernel> for Kernel {
    fn from(k: ExplicitKernel) -> Self {
        Kernel::Explicit(k)
    }
}

/// Expand a FWHM specification to one positive, finite value per axis.
pub fn broadcast_fwhm(fwhm: &[f64], dim: usize) -> Result<Vec<f64>, FieldError> {
    let expanded = match fwhm.len() {
        1 => vec![fwhm[0]; dim],
        n if n == dim => fwhm.to_vec(),
        n => {
            return Err(FieldError::InvalidKernel(format!(
                "expected 1 or {dim} FWHM values, got {n}"
            )))
        }
    };

    if let Some(bad) = expanded.iter().find(|f| !f.is_finite() || **f <= 0.0) {
        return Err(FieldError::InvalidKernel(format!(
            "FWHM must be finite and > 0, got {bad}"
        )));
    }
    Ok(expanded)
}

// ============================================================================
// Resolved Kernel
// ============================================================================

#[derive(Debug, Clone)]
enum ResolvedKind {
    Gaussian { sigma: Vec<f64> },
    Explicit(ExplicitKernel),
}

/// Kernel resolved for a fixed dimension.
#[derive(Debug, Clone)]
pub struct ResolvedKernel {
    dim: usize,
    kind: ResolvedKind,
}

impl ResolvedKernel {
    /// Number of spatial axes.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Per-axis standard deviations, if Gaussian.
    pub fn sigma(&self) -> Option<&[f64]> {
        match &self.kind {
            ResolvedKind::Gaussian { sigma } => Some(sigma),
            ResolvedKind::Explicit(_) => None,
        }
    }

    /// Kernel-derived truncation radius; `None` when the kernel has no known spread.
    pub fn spread(&self) -> Option<f64> {
        self.sigma().map(|s| {
            KERNEL_SUPPORT_SIGMAS * s.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })
    }

    /// Kernel weight at offset `u`.
    #[inline]
    pub fn value(&self, u: &[f64]) -> f64 {
        match &self.kind {
            ResolvedKind::Gaussian { sigma } => gaussian(u, sigma),
            ResolvedKind::Explicit(k) => (k.value)(u),
        }
    }

    /// Kernel gradient at offset `u`.
    pub fn gradient(&self, u: &[f64]) -> Vec<f64> {
        match &self.kind {
            ResolvedKind::Gaussian { sigma } => gaussian_gradient(u, sigma),
            ResolvedKind::Explicit(k) => match &k.gradient {
                Some(g) => g(u),
                None => {
                    let value = k.value.clone();
                    make_scalar_derivatives(move |x| value(x), self.dim, Some(DEFAULT_STEP))
                        .and_then(|d| d.gradient(u))
                        .unwrap_or_else(|_| vec![f64::NAN; self.dim])
                }
            },
        }
    }

    /// Kernel Hessian at offset `u`.
    pub fn hessian(&self, u: &[f64]) -> Vec<Vec<f64>> {
        match &self.kind {
            ResolvedKind::Gaussian { sigma } => gaussian_hessian(u, sigma),
            ResolvedKind::Explicit(k) => match &k.hessian {
                Some(h) => h(u),
                None => {
                    let value = k.value.clone();
                    make_scalar_derivatives(move |x| value(x), self.dim, Some(DEFAULT_STEP))
                        .and_then(|d| d.hessian(u))
                        .map(|h| h.outer_iter().map(|row| row.to_vec()).collect())
                        .unwrap_or_else(|_| vec![vec![f64::NAN; self.dim]; self.dim])
                }
            },
        }
    }
}
