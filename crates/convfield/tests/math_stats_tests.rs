#![cfg(feature = "dev")]
//! Tests for one-sample summary statistics.
//!
//! These tests verify the subject-axis reductions:
//! - t-statistic, mean, standard deviation and Cohen's d on known values
//! - Degenerate (zero-variance) points
//! - Lattice reductions and sample covariances
//!
//! ## Test Organization
//!
//! 1. **Point Statistics** - Known values and degenerate cases
//! 2. **Matrix and Lattice Reductions** - Row-wise and last-axis reductions
//! 3. **Covariance** - Sample covariance and covariance fields

use approx::assert_relative_eq;
use ndarray::{array, Array2, ArrayD, IxDyn};

use convfield::internals::math::stats::{
    covariance_field, sample_covariance, summarize, t_stat, t_stat_lattice,
};

// ============================================================================
// Point Statistics
// ============================================================================

/// Test summary statistics of [1, 2, 3, 4].
#[test]
fn test_summarize_known_values() {
    let s = summarize(array![1.0, 2.0, 3.0, 4.0].view());

    assert_relative_eq!(s.mean, 2.5, epsilon = 1e-12);
    assert_relative_eq!(s.sd, 1.290_994_448_735_805_6, epsilon = 1e-12);
    assert_relative_eq!(s.tstat, 3.872_983_346_207_417, epsilon = 1e-12);
    assert_relative_eq!(s.cohens_d, 1.936_491_673_103_708_5, epsilon = 1e-12);
    assert!(!s.is_degenerate());
}

/// Test that zero variance gives signed infinities or NaN.
#[test]
fn test_summarize_degenerate() {
    let pos = summarize(array![2.0, 2.0, 2.0].view());
    assert!(pos.is_degenerate());
    assert_eq!(pos.tstat, f64::INFINITY);
    assert_eq!(pos.cohens_d, f64::INFINITY);

    let neg = summarize(array![-1.0, -1.0].view());
    assert_eq!(neg.tstat, f64::NEG_INFINITY);

    let zero = summarize(array![0.0_f64, 0.0].view());
    assert!(zero.tstat.is_nan());
    assert!(zero.cohens_d.is_nan());
}

/// Test that identical values are degenerate even when the mean rounds.
///
/// `(0.1 + 0.1 + 0.1) / 3` is not exactly `0.1`, so the centred sum of
/// squares picks up rounding noise.
#[test]
fn test_summarize_identical_non_dyadic_values() {
    for n in [3, 5, 7] {
        let s = summarize(ndarray::Array1::from_elem(n, 0.1).view());
        assert_eq!(s.sd, 0.0);
        assert_eq!(s.tstat, f64::INFINITY);
        assert_eq!(s.cohens_d, f64::INFINITY);
        assert!(s.is_degenerate());
    }

    let neg = summarize(ndarray::Array1::from_elem(3, -0.3).view());
    assert_eq!(neg.sd, 0.0);
    assert_eq!(neg.tstat, f64::NEG_INFINITY);
}

/// Test that the t-statistic flips sign with the data.
#[test]
fn test_summarize_sign_symmetry() {
    let a = summarize(array![0.3, 1.1, -0.2, 0.9].view());
    let b = summarize(array![-0.3, -1.1, 0.2, -0.9].view());
    assert_relative_eq!(a.tstat, -b.tstat, epsilon = 1e-14);
    assert_relative_eq!(a.sd, b.sd, epsilon = 1e-14);
}

// ============================================================================
// Matrix and Lattice Reductions
// ============================================================================

/// Test row-wise reduction of a points x subjects matrix.
#[test]
fn test_t_stat_rows() {
    let samples = Array2::from_shape_vec(
        (2, 4),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 5.0, 5.0],
    )
    .unwrap();
    let out = t_stat(samples.view());

    assert_eq!(out.tstat.len(), 2);
    assert_relative_eq!(out.tstat[0], 3.872_983_346_207_417, epsilon = 1e-12);
    assert_eq!(out.tstat[1], f64::INFINITY);
    assert_eq!(out.mean[1], 5.0);
    assert_eq!(out.sd[1], 0.0);
}

/// Test the lattice reduction over the last axis.
#[test]
fn test_t_stat_lattice_shape_and_values() {
    let data = ArrayD::from_shape_fn(IxDyn(&[3, 2, 4]), |idx| {
        (idx[0] * 2 + idx[1]) as f64 + idx[2] as f64
    });
    let t = t_stat_lattice(&data.view());

    assert_eq!(t.shape(), &[3, 2]);
    for i in 0..3 {
        for j in 0..2 {
            let lane: Vec<f64> = (0..4).map(|s| data[[i, j, s]]).collect();
            let expected = summarize(ndarray::aview1(&lane)).tstat;
            assert_eq!(t[[i, j]], expected);
        }
    }
}

// ============================================================================
// Covariance
// ============================================================================

/// Test the sample covariance.
#[test]
fn test_sample_covariance() {
    let a = array![1.0, 2.0, 3.0, 4.0];
    let b = array![2.0, 4.0, 6.0, 8.0];
    assert_relative_eq!(sample_covariance(a.view(), b.view()), 10.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(sample_covariance(a.view(), a.view()), 5.0 / 3.0, epsilon = 1e-12);
}

/// Test the covariance field over a 1-D lattice.
#[test]
fn test_covariance_field() {
    let a = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |idx| (idx[1] as f64) * (idx[0] + 1) as f64);
    let b = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |idx| -(idx[1] as f64));
    let cov = covariance_field(&a.view(), &b.view());

    assert_eq!(cov.shape(), &[2]);
    assert_relative_eq!(cov[[0]], -1.0, epsilon = 1e-12);
    assert_relative_eq!(cov[[1]], -2.0, epsilon = 1e-12);
}
