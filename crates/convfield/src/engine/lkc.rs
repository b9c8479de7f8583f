//! Lipschitz-Killing curvature estimation.
//!
//! ## Purpose
//!
//! Estimates the LKCs of the Riemannian metric that a Gaussian-smoothed
//! random field induces on a rectangular domain, from an ensemble of
//! realisations. Optionally computes the same quantities for smoothed unit
//! white noise on the same domain.
//!
//! ## Design notes
//!
//! * **Fine grid**: Data is zero-insert upsampled so that a discrete
//!   convolution evaluates the continuous convolution field between lattice
//!   points.
//! * **Separable smoothing**: The field and each partial derivative are one
//!   separable convolution apiece.
//! * **Deterministic**: Covariances are accumulated in subject order on a
//!   single thread.
//! * **Shared tail**: Data and theory paths produce the same covariance fields
//!   and go through one geometry and integration routine.
//!
//! ## Key concepts
//!
//! * **Induced metric**:
//!   `g_ij = Cov(d_iY, d_jY)/Var(Y) - Cov(Y, d_iY) Cov(Y, d_jY)/Var(Y)^2`,
//!   the covariance of the derivatives of the variance-normalised field.
//! * **Volume form**: `sqrt(det g)`; its integral is `L_D`.
//! * **Boundary length**: In 2-D, `L1` is half the metric length of the box
//!   boundary.
//! * **Theory covariances**: For unit white noise `e`, `Cov(K*e, dK*e)` is the
//!   domain indicator convolved with `K dK`, and likewise for the other pairs.
//!
//! ## Invariants
//!
//! * Diagonal metric components and the volume form are non-negative.
//! * Points with zero variance have volume form 0.
//!
//! ## Non-goals
//!
//! * `L1` and `L2` for three-dimensional domains.

// External dependencies
use ndarray::{ArrayD, Dimension, IxDyn};
use tracing::{debug, warn};

// Internal dependencies
use crate::algorithms::smoothing::{separable_convolve, smooth, smooth_derivative, SampledKernel};
use crate::algorithms::triangulation::{integrate_over_triangulation, triangulate_grid};
use crate::engine::output::{Geometry, LkcResult};
use crate::engine::validator::Validator;
use crate::math::kernel::{broadcast_fwhm, fwhm_to_sigma};
use crate::math::stats::covariance_field;
use crate::primitives::errors::FieldError;
use crate::primitives::grid::{fine_axis, fine_spacing, trim_edges, upsample_zero_insert};
use crate::primitives::lattice::LatticeField;

// ============================================================================
// Configuration
// ============================================================================

/// Parameters of an LKC estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct LkcConfig {
    /// Gaussian FWHM, one value or one per axis, in lattice units.
    pub fwhm: Vec<f64>,

    /// Extra fine points inserted between lattice points.
    pub res_add: usize,

    /// Lattice units trimmed from each edge before integration.
    pub remove: usize,

    /// Also compute the curvatures of smoothed unit white noise.
    pub theory: bool,
}

impl Default for LkcConfig {
    fn default() -> Self {
        Self {
            fwhm: vec![1.0],
            res_add: 0,
            remove: 0,
            theory: false,
        }
    }
}

// ============================================================================
// Covariance Fields
// ============================================================================

/// Covariances of a smoothed field and its partial derivatives on one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceFields {
    /// `Var(Y)`.
    pub var: ArrayD<f64>,
    /// `Var(d_iY)`.
    pub deriv_var: Vec<ArrayD<f64>>,
    /// `Cov(Y, d_iY)`.
    pub cov_field_deriv: Vec<ArrayD<f64>>,
    /// `Cov(d_iY, d_jY)` for `i < j`.
    pub cov_deriv_pairs: Vec<ArrayD<f64>>,
}

/// Axis pairs `(i, j)` with `i < j`, in the order used by `cov_deriv_pairs`.
pub fn axis_pairs(dim: usize) -> Vec<(usize, usize)> {
    (0..dim)
        .flat_map(|i| (i + 1..dim).map(move |j| (i, j)))
        .collect()
}

/// Position of `(i, j)` in [`axis_pairs`], for distinct axes below `dim`.
pub fn pair_slot(i: usize, j: usize, dim: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    debug_assert!(i < j && j < dim, "axis pair ({i}, {j}) out of range for dim {dim}");
    i * (2 * dim - i - 1) / 2 + (j - i - 1)
}

/// Sample covariances of an ensemble, trimmed by `trim` fine samples per edge.
///
/// `upsampled` has shape `[fine.., nsubj]`.
fn empirical_covariances(
    upsampled: &ArrayD<f64>,
    kernels: &[SampledKernel],
    trim: usize,
) -> Result<CovarianceFields, FieldError> {
    let dim = kernels.len();
    let view = upsampled.view();

    let field = trim_edges(&smooth(&view, kernels), trim, dim)?;
    let derivs = (0..dim)
        .map(|i| trim_edges(&smooth_derivative(&view, kernels, i), trim, dim))
        .collect::<Result<Vec<_>, _>>()?;

    let var = covariance_field(&field.view(), &field.view());
    let deriv_var = derivs
        .iter()
        .map(|d| covariance_field(&d.view(), &d.view()))
        .collect();
    let cov_field_deriv = derivs
        .iter()
        .map(|d| covariance_field(&field.view(), &d.view()))
        .collect();
    let cov_deriv_pairs = axis_pairs(dim)
        .into_iter()
        .map(|(i, j)| covariance_field(&derivs[i].view(), &derivs[j].view()))
        .collect();

    Ok(CovarianceFields {
        var,
        deriv_var,
        cov_field_deriv,
        cov_deriv_pairs,
    })
}

/// Exact covariances of unit white noise on the lattice, smoothed by the kernels.
///
/// `indicator` is the upsampled domain indicator, shape `[fine..]`.
fn theoretical_covariances(
    indicator: &ArrayD<f64>,
    kernels: &[SampledKernel],
    trim: usize,
) -> Result<CovarianceFields, FieldError> {
    let dim = kernels.len();
    let view = indicator.view();

    let squared: Vec<Vec<f64>> = kernels.iter().map(SampledKernel::squared).collect();
    let deriv_squared: Vec<Vec<f64>> = kernels.iter().map(SampledKernel::derivative_squared).collect();
    let mixed: Vec<Vec<f64>> = kernels
        .iter()
        .map(SampledKernel::value_times_derivative)
        .collect();

    // Product kernel whose axis factors are squared values except where overridden
    let product = |overrides: &[(usize, &Vec<f64>)]| -> Result<ArrayD<f64>, FieldError> {
        let taps: Vec<&[f64]> = (0..dim)
            .map(|axis| {
                overrides
                    .iter()
                    .find(|(a, _)| *a == axis)
                    .map_or(squared[axis].as_slice(), |(_, t)| t.as_slice())
            })
            .collect();
        trim_edges(&separable_convolve(&view, &taps), trim, dim)
    };

    let var = product(&[])?;
    let deriv_var = (0..dim)
        .map(|i| product(&[(i, &deriv_squared[i])]))
        .collect::<Result<Vec<_>, _>>()?;
    let cov_field_deriv = (0..dim)
        .map(|i| product(&[(i, &mixed[i])]))
        .collect::<Result<Vec<_>, _>>()?;
    let cov_deriv_pairs = axis_pairs(dim)
        .into_iter()
        .map(|(i, j)| product(&[(i, &mixed[i]), (j, &mixed[j])]))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CovarianceFields {
        var,
        deriv_var,
        cov_field_deriv,
        cov_deriv_pairs,
    })
}

// ============================================================================
// Geometry
// ============================================================================

/// Determinant of the leading `dim x dim` block.
fn determinant(g: &[[f64; 3]; 3], dim: usize) -> f64 {
    match dim {
        1 => g[0][0],
        2 => g[0][0] * g[1][1] - g[0][1] * g[1][0],
        _ => {
            g[0][0] * (g[1][1] * g[2][2] - g[1][2] * g[2][1])
                - g[0][1] * (g[1][0] * g[2][2] - g[1][2] * g[2][0])
                + g[0][2] * (g[1][0] * g[2][1] - g[1][1] * g[2][0])
        }
    }
}

/// Build the induced metric and volume form from covariance fields.
pub fn metric_geometry(cov: CovarianceFields, dx: f64) -> Geometry {
    let dim = cov.deriv_var.len();
    let var = &cov.var;

    let component = |i: usize, j: usize| -> ArrayD<f64> {
        let cross = if i == j {
            &cov.deriv_var[i]
        } else {
            &cov.cov_deriv_pairs[pair_slot(i, j, dim)]
        };
        let mut g = ArrayD::<f64>::zeros(var.raw_dim());
        ndarray::Zip::from(&mut g)
            .and(var)
            .and(cross)
            .and(&cov.cov_field_deriv[i])
            .and(&cov.cov_field_deriv[j])
            .for_each(|g, &v, &c, &ci, &cj| {
                if v > 0.0 {
                    let value = c / v - ci * cj / (v * v);
                    *g = if i == j { value.max(0.0) } else { value };
                }
            });
        g
    };

    let mut metric: Vec<Vec<ArrayD<f64>>> = vec![Vec::with_capacity(dim); dim];
    for i in 0..dim {
        for j in 0..dim {
            let g = if j < i {
                metric[j][i].clone()
            } else {
                component(i, j)
            };
            metric[i].push(g);
        }
    }

    let volume_form = ArrayD::from_shape_fn(var.raw_dim(), |idx: IxDyn| {
        let at = idx.slice();
        if var[at] <= 0.0 {
            return 0.0;
        }
        let mut g = [[0.0; 3]; 3];
        for (i, row) in metric.iter().enumerate() {
            for (j, comp) in row.iter().enumerate() {
                g[i][j] = comp[at];
            }
        }
        determinant(&g, dim).max(0.0).sqrt()
    });

    Geometry {
        volume_form,
        var_field: cov.var,
        deriv_var: cov.deriv_var,
        cov_field_deriv: cov.cov_field_deriv,
        cov_deriv_pairs: cov.cov_deriv_pairs,
        metric,
        dx,
    }
}

// ============================================================================
// Integration
// ============================================================================

/// Trapezoid-rule integral of a field on a regular grid of spacing `dx`.
pub fn trapezoid_nd(field: &ArrayD<f64>, dx: f64) -> f64 {
    let shape = field.shape().to_vec();
    let weight = |k: usize, len: usize| -> f64 {
        if len < 2 {
            0.0
        } else if k == 0 || k == len - 1 {
            0.5
        } else {
            1.0
        }
    };

    let sum: f64 = field
        .indexed_iter()
        .map(|(idx, &v)| {
            let w: f64 = idx
                .slice()
                .iter()
                .zip(&shape)
                .map(|(&k, &len)| weight(k, len))
                .product();
            w * v
        })
        .sum();
    sum * dx.powi(shape.len() as i32)
}

/// Half the metric length of the boundary of a 2-D box.
fn half_boundary_length(geometry: &Geometry) -> f64 {
    let shape = geometry.shape();
    let (nx, ny) = (shape[0], shape[1]);
    let dx = geometry.dx;
    let g00 = &geometry.metric[0][0];
    let g11 = &geometry.metric[1][1];
    let speed = |g: &ArrayD<f64>, i: usize, j: usize| g[[i, j].as_slice()].max(0.0).sqrt();

    let mut total = 0.0;
    // Edges running along axis 0
    for &j in &[0, ny - 1] {
        for i in 0..nx.saturating_sub(1) {
            total += (speed(g00, i, j) + speed(g00, i + 1, j)) * dx / 4.0;
        }
    }
    // Edges running along axis 1
    for &i in &[0, nx - 1] {
        for j in 0..ny.saturating_sub(1) {
            total += (speed(g11, i, j) + speed(g11, i, j + 1)) * dx / 4.0;
        }
    }
    total
}

/// Curvatures `L1..LD` of a geometry; `None` where not computed.
pub fn lkc_from_geometry(geometry: &Geometry) -> Result<Vec<Option<f64>>, FieldError> {
    let dim = geometry.shape().len();
    let dx = geometry.dx;

    match dim {
        1 => Ok(vec![Some(trapezoid_nd(&geometry.volume_form, dx))]),
        2 => {
            let shape = geometry.shape();
            let xs = fine_axis(shape[0], dx);
            let ys = fine_axis(shape[1], dx);
            let tri = triangulate_grid(&xs, &ys);
            let values: Vec<f64> = geometry.volume_form.iter().copied().collect();
            let l2 = integrate_over_triangulation(&tri, &values)?;
            Ok(vec![Some(half_boundary_length(geometry)), Some(l2)])
        }
        3 => {
            warn!("L1 and L2 are not computed for three-dimensional domains");
            Ok(vec![None, None, Some(trapezoid_nd(&geometry.volume_form, dx))])
        }
        _ => Err(FieldError::UnsupportedDimension {
            dim,
            max: 3,
            operation: "LKC estimation",
        }),
    }
}

// ============================================================================
// Estimator
// ============================================================================

/// Estimate the LKCs of an ensemble of fields.
pub fn estimate_lkc(data: &LatticeField, config: &LkcConfig) -> Result<LkcResult, FieldError> {
    Validator::validate_lattice(data, "LKC estimation")?;
    let dim = data.dim();
    let fwhm = broadcast_fwhm(&config.fwhm, dim)?;

    let step = config.res_add + 1;
    let dx = fine_spacing(config.res_add);
    let trim = config.remove * step;
    let kernels: Vec<SampledKernel> = fwhm
        .iter()
        .map(|&f| SampledKernel::gaussian(fwhm_to_sigma(f), config.res_add))
        .collect();

    debug!(
        dim,
        nsubj = data.nsubj(),
        res_add = config.res_add,
        remove = config.remove,
        "estimating LKCs"
    );

    let upsampled = upsample_zero_insert(&data.view(), config.res_add, dim);
    let geometry = metric_geometry(empirical_covariances(&upsampled, &kernels, trim)?, dx);
    let lkc = lkc_from_geometry(&geometry)?;

    let (true_lkc, theory_geometry) = if config.theory {
        let ones = ArrayD::<f64>::ones(IxDyn(data.spatial_shape()));
        let indicator = upsample_zero_insert(&ones.view(), config.res_add, dim);
        let theory = metric_geometry(theoretical_covariances(&indicator, &kernels, trim)?, dx);
        (Some(lkc_from_geometry(&theory)?), Some(theory))
    } else {
        (None, None)
    };

    Ok(LkcResult {
        lkc,
        true_lkc,
        geometry,
        theory_geometry,
    })
}
