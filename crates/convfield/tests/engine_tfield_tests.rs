#![cfg(feature = "dev")]
//! Tests for the continuous t-field.
//!
//! These tests verify evaluation of the t-statistic field at arbitrary points:
//! - Agreement with the lattice t-statistic under a delta kernel
//! - Invariance to subject order and equivariance to query order
//! - Degenerate points and input validation
//! - Analytic derivatives against finite differences
//!
//! ## Test Organization
//!
//! 1. **Lattice Agreement** - Delta kernel in 1, 2 and 3 dimensions
//! 2. **Symmetries** - Subject and query permutations
//! 3. **Degenerate Points** - Zero variance
//! 4. **Validation** - Shape, finiteness and dimension errors
//! 5. **Derivatives** - Gradient, Hessian and smoothed mask

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use convfield::internals::algorithms::convolution::Truncation;
use convfield::internals::engine::tfield::ContinuousTField;
use convfield::internals::math::kernel::Kernel;
use convfield::internals::math::stats::t_stat_lattice;
use convfield::internals::primitives::errors::FieldError;
use convfield::internals::primitives::lattice::{unravel_index, LatticeField};

// ============================================================================
// Helper Functions
// ============================================================================

/// Box kernel that picks out the nearest lattice point.
fn delta_kernel() -> Kernel {
    Kernel::explicit(|u: &[f64]| {
        if u.iter().all(|v| v.abs() < 0.5) {
            1.0
        } else {
            0.0
        }
    })
}

/// Gaussian noise lattice with subject axis last.
fn noise_lattice(spatial: &[usize], nsubj: usize, seed: u64) -> LatticeField {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shape = spatial.to_vec();
    shape.push(nsubj);
    let data = ArrayD::from_shape_simple_fn(IxDyn(&shape), || rng.sample::<f64, _>(StandardNormal));
    LatticeField::new(data).unwrap()
}

/// Every lattice point as a `D x nvox` matrix of unit coordinates.
fn lattice_points(shape: &[usize]) -> Array2<f64> {
    let nvox: usize = shape.iter().product();
    Array2::from_shape_fn((shape.len(), nvox), |(d, v)| {
        (unravel_index(v, shape)[d] + 1) as f64
    })
}

// ============================================================================
// Lattice Agreement
// ============================================================================

/// Test that a delta kernel reproduces the lattice t-statistic in 1-3 dimensions.
#[test]
fn test_delta_kernel_matches_lattice_t() {
    for (seed, shape) in [vec![7], vec![4, 5], vec![3, 3, 4]].into_iter().enumerate() {
        let data = noise_lattice(&shape, 6, seed as u64);
        let field = ContinuousTField::new(&data, &delta_kernel(), None, None, Truncation::None)
            .unwrap();

        let result = field.evaluate(&lattice_points(&shape).view()).unwrap();
        let expected = t_stat_lattice(&data.view());

        assert_eq!(result.len(), expected.len());
        for (got, want) in result.tstat.iter().zip(expected.iter()) {
            assert_eq!(got, want);
        }
        assert_eq!(result.subject_values, data.voxels().to_owned());
    }
}

// ============================================================================
// Symmetries
// ============================================================================

/// Test that reordering subjects leaves the statistics unchanged.
#[test]
fn test_subject_permutation_invariance() {
    let data = noise_lattice(&[12], 5, 11);
    let order = [3, 0, 4, 1, 2];
    let permuted = ArrayD::from_shape_fn(IxDyn(&[12, 5]), |idx| {
        data.view()[[idx[0], order[idx[1]]].as_slice()]
    });
    let permuted = LatticeField::new(permuted).unwrap();

    let kernel = Kernel::fwhm(3.0);
    let points = Array2::from_shape_vec((1, 4), vec![1.5, 4.2, 7.7, 11.9]).unwrap();
    let a = ContinuousTField::new(&data, &kernel, None, None, Truncation::None)
        .unwrap()
        .evaluate(&points.view())
        .unwrap();
    let b = ContinuousTField::new(&permuted, &kernel, None, None, Truncation::None)
        .unwrap()
        .evaluate(&points.view())
        .unwrap();

    for j in 0..4 {
        assert_relative_eq!(a.tstat[j], b.tstat[j], max_relative = 1e-10);
        assert_relative_eq!(a.mean[j], b.mean[j], max_relative = 1e-10);
        assert_relative_eq!(a.sd[j], b.sd[j], max_relative = 1e-10);
    }
}

/// Test that reordering query points reorders the output exactly.
#[test]
fn test_query_permutation_equivariance() {
    let data = noise_lattice(&[6, 6], 4, 5);
    let field =
        ContinuousTField::new(&data, &Kernel::fwhm(2.0), None, None, Truncation::KernelDefault)
            .unwrap();

    let points =
        Array2::from_shape_vec((2, 3), vec![1.5, 3.25, 5.0, 2.0, 4.75, 3.5]).unwrap();
    let reversed =
        Array2::from_shape_vec((2, 3), vec![5.0, 3.25, 1.5, 3.5, 4.75, 2.0]).unwrap();

    let a = field.evaluate(&points.view()).unwrap();
    let b = field.evaluate(&reversed.view()).unwrap();
    for j in 0..3 {
        assert_eq!(a.tstat[j], b.tstat[2 - j]);
        assert_eq!(a.cohens_d[j], b.cohens_d[2 - j]);
    }
}

/// Test that custom coordinates shift where the field is sampled.
#[test]
fn test_custom_coordinates() {
    let data = noise_lattice(&[5], 4, 2);
    let coords = vec![vec![10.0, 20.0, 30.0, 40.0, 50.0]];
    let field = ContinuousTField::new(&data, &delta_kernel(), Some(coords.as_slice()), None, Truncation::None)
        .unwrap();

    let points = Array2::from_shape_vec((1, 1), vec![30.0]).unwrap();
    let result = field.evaluate(&points.view()).unwrap();
    assert_eq!(result.tstat[0], t_stat_lattice(&data.view())[[2]]);
}

// ============================================================================
// Degenerate Points
// ============================================================================

/// Test that identical subjects give zero variance and infinite t.
#[test]
fn test_identical_subjects_are_degenerate() {
    let data = ArrayD::from_shape_fn(IxDyn(&[8, 2]), |idx| 1.0 + idx[0] as f64);
    let data = LatticeField::new(data).unwrap();
    let field = ContinuousTField::new(&data, &Kernel::fwhm(2.0), None, None, Truncation::None)
        .unwrap();

    let points = Array2::from_shape_vec((1, 3), vec![2.0, 4.5, 7.0]).unwrap();
    let result = field.evaluate(&points.view()).unwrap();

    assert_eq!(result.degenerate, vec![0, 1, 2]);
    assert!(result.has_degenerate());
    assert!(result.tstat.iter().all(|&t| t == f64::INFINITY));
    assert!(result.sd.iter().all(|&s| s == 0.0));
}

/// Test degeneracy with three identical subjects of non-dyadic value.
#[test]
fn test_identical_subjects_with_rounding_mean() {
    let data = ArrayD::from_elem(IxDyn(&[8, 3]), 0.1);
    let data = LatticeField::new(data).unwrap();
    let field = ContinuousTField::new(&data, &Kernel::fwhm(2.0), None, None, Truncation::None)
        .unwrap();

    let points = Array2::from_shape_vec((1, 2), vec![2.0, 4.5]).unwrap();
    let result = field.evaluate(&points.view()).unwrap();

    assert_eq!(result.degenerate, vec![0, 1]);
    assert_eq!(result.sd, vec![0.0, 0.0]);
    assert!(result.tstat.iter().all(|&t| t == f64::INFINITY));
}

// ============================================================================
// Validation
// ============================================================================

/// Test query-point validation.
#[test]
fn test_query_point_errors() {
    let data = noise_lattice(&[4, 4], 3, 1);
    let field = ContinuousTField::new(&data, &Kernel::fwhm(2.0), None, None, Truncation::None)
        .unwrap();

    let wrong_rows = Array2::<f64>::zeros((3, 2));
    assert!(matches!(
        field.evaluate(&wrong_rows.view()),
        Err(FieldError::ShapeMismatch { .. })
    ));

    let non_finite = Array2::from_shape_vec((2, 1), vec![1.0, f64::NAN]).unwrap();
    assert!(matches!(
        field.evaluate(&non_finite.view()),
        Err(FieldError::InvalidNumericValue(_))
    ));
}

/// Test lattice and configuration validation.
#[test]
fn test_binding_errors() {
    let kernel = Kernel::fwhm(2.0);

    let mut raw = ArrayD::<f64>::zeros(IxDyn(&[4, 3]));
    raw[[2, 1]] = f64::NAN;
    let missing = LatticeField::new(raw).unwrap();
    assert_eq!(
        ContinuousTField::new(&missing, &kernel, None, None, Truncation::None).unwrap_err(),
        FieldError::MissingValues { index: 7 }
    );

    let one_subject = noise_lattice(&[4], 1, 0);
    assert!(matches!(
        ContinuousTField::new(&one_subject, &kernel, None, None, Truncation::None),
        Err(FieldError::TooFewSubjects { got: 1, min: 2 })
    ));

    let four_d = noise_lattice(&[2, 2, 2, 2], 3, 0);
    assert!(matches!(
        ContinuousTField::new(&four_d, &kernel, None, None, Truncation::None),
        Err(FieldError::UnsupportedDimension { dim: 4, .. })
    ));

    let data = noise_lattice(&[4, 4], 3, 0);
    let bad_mask = ArrayD::from_elem(IxDyn(&[4, 3]), true);
    assert!(matches!(
        ContinuousTField::new(&data, &kernel, None, Some(&bad_mask), Truncation::None),
        Err(FieldError::ShapeMismatch { what: "mask", .. })
    ));

    assert!(matches!(
        ContinuousTField::new(&data, &kernel, None, None, Truncation::Radius(-2.0)),
        Err(FieldError::InvalidParameter { .. })
    ));

    assert!(matches!(
        ContinuousTField::new(&data, &Kernel::anisotropic(vec![1.0, 2.0, 3.0]), None, None, Truncation::None),
        Err(FieldError::InvalidKernel(_))
    ));
}

// ============================================================================
// Derivatives
// ============================================================================

/// Test analytic t-field derivatives against central differences.
#[test]
fn test_analytic_derivatives_match_differences() {
    let data = noise_lattice(&[8, 8], 6, 21);
    let field = ContinuousTField::new(&data, &Kernel::fwhm(3.0), None, None, Truncation::None)
        .unwrap();

    let x = [4.3, 5.1];
    let h = 1e-5;
    let analytic = field.derivatives_at(&x);
    assert_relative_eq!(analytic.value, field.t_at(&x), max_relative = 1e-10);

    for a in 0..2 {
        let mut up = x;
        let mut down = x;
        up[a] += h;
        down[a] -= h;

        let fd = (field.t_at(&up) - field.t_at(&down)) / (2.0 * h);
        assert_abs_diff_eq!(analytic.gradient[a], fd, epsilon = 1e-5);

        let gup = field.derivatives_at(&up).gradient;
        let gdown = field.derivatives_at(&down).gradient;
        for b in 0..2 {
            let fd2 = (gup[b] - gdown[b]) / (2.0 * h);
            assert_abs_diff_eq!(analytic.hessian[[b, a]], fd2, epsilon = 1e-4);
        }
    }
    assert_eq!(analytic.hessian[[0, 1]], analytic.hessian[[1, 0]]);
}

/// Test the smoothed mask and the weighted objective.
#[test]
fn test_mask_weight_and_weighted_derivatives() {
    let data = noise_lattice(&[30], 4, 8);
    let fwhm = (8.0 * 2.0_f64.ln()).sqrt();
    let field = ContinuousTField::new(&data, &Kernel::fwhm(fwhm), None, None, Truncation::None)
        .unwrap();

    // Normalised unit Gaussian sums to ~1 far from the edges
    assert_abs_diff_eq!(field.mask_weight_at(&[15.0]), 1.0, epsilon = 1e-6);
    assert!(field.mask_weight_at(&[1.0]) < 0.75);

    let x = [14.2];
    let w = field.weighted_derivatives_at(&x);
    assert_relative_eq!(w.value, field.weighted_t_at(&x), max_relative = 1e-10);

    let h = 1e-5;
    let fd = (field.weighted_t_at(&[x[0] + h]) - field.weighted_t_at(&[x[0] - h])) / (2.0 * h);
    assert_abs_diff_eq!(w.gradient[0], fd, epsilon = 1e-5);
}
