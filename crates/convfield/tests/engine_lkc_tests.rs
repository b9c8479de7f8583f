#![cfg(feature = "dev")]
//! Tests for Lipschitz-Killing curvature estimation.
//!
//! These tests verify the LKC estimator on white-noise ensembles:
//! - Agreement between estimated and theoretical curvatures in 1-D and 2-D
//! - The stationary closed form for a trimmed domain
//! - Invariance of stationary estimates to the resolution increase
//! - Three-dimensional partial results and input validation
//!
//! ## Test Organization
//!
//! 1. **Estimates vs Theory** - White noise in 1-D and 2-D
//! 2. **Closed Form** - Stationary metric `1 / (2 sigma^2)`
//! 3. **Resolution** - Fine-grid invariance
//! 4. **Three Dimensions** - Volume only
//! 5. **Validation** - Errors and degenerate data

use approx::assert_relative_eq;
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use convfield::internals::api::{FieldError, LatticeField, LkcBuilder};
use convfield::internals::engine::lkc::{
    axis_pairs, estimate_lkc, pair_slot, trapezoid_nd, LkcConfig,
};
use convfield::internals::math::kernel::fwhm_to_sigma;

// ============================================================================
// Helper Functions
// ============================================================================

/// White-noise ensemble with subject axis last.
fn white_noise(spatial: &[usize], nsubj: usize, seed: u64) -> LatticeField {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shape = spatial.to_vec();
    shape.push(nsubj);
    let data = ArrayD::from_shape_simple_fn(IxDyn(&shape), || rng.sample::<f64, _>(StandardNormal));
    LatticeField::new(data).unwrap()
}

// ============================================================================
// Estimates vs Theory
// ============================================================================

/// Test that the 1-D estimate is close to the white-noise curvature.
#[test]
fn test_white_noise_1d_matches_theory() {
    let data = white_noise(&[60], 500, 42);
    let result = LkcBuilder::new()
        .fwhm(6.0)
        .theory(true)
        .build()
        .unwrap()
        .estimate(&data)
        .unwrap();

    let estimate = result.get(1).unwrap();
    let theory = result.true_lkc.as_ref().unwrap()[0].unwrap();
    assert!(theory > 0.0);
    assert_relative_eq!(estimate, theory, max_relative = 0.1);
    assert!(result.is_complete());
    assert!(result.theory_geometry.is_some());
}

/// Test that both 2-D curvatures are close to theory.
#[test]
fn test_white_noise_2d_matches_theory() {
    let data = white_noise(&[25, 25], 300, 7);
    let result = LkcBuilder::new()
        .fwhm(4.0)
        .theory(true)
        .build()
        .unwrap()
        .estimate(&data)
        .unwrap();

    let theory = result.true_lkc.clone().unwrap();
    assert_eq!(result.lkc.len(), 2);
    assert_relative_eq!(result.lkc[0].unwrap(), theory[0].unwrap(), max_relative = 0.1);
    assert_relative_eq!(result.lkc[1].unwrap(), theory[1].unwrap(), max_relative = 0.1);
    assert_eq!(result.geometry.metric.len(), 2);
    assert_eq!(result.geometry.cov_deriv_pairs.len(), 1);
}

// ============================================================================
// Closed Form
// ============================================================================

/// Test the stationary closed form after trimming the boundary.
///
/// Away from the edges the metric is `1 / (2 sigma^2)`, so `L1 = length / (sigma sqrt 2)`.
#[test]
fn test_trimmed_theory_matches_closed_form() {
    let data = white_noise(&[60], 3, 0);
    let fwhm = 6.0;
    let result = estimate_lkc(
        &data,
        &LkcConfig {
            fwhm: vec![fwhm],
            res_add: 0,
            remove: 11,
            theory: true,
        },
    )
    .unwrap();

    let sigma = fwhm_to_sigma(fwhm);
    let expected = 37.0 / (sigma * 2.0_f64.sqrt());
    let theory = result.true_lkc.unwrap()[0].unwrap();
    assert_relative_eq!(theory, expected, max_relative = 0.02);
    assert_eq!(result.geometry.shape(), &[38]);
}

/// Test the trapezoid rule on a linear profile.
#[test]
fn test_trapezoid_rule() {
    let field = ArrayD::from_shape_fn(IxDyn(&[5]), |idx| idx[0] as f64);
    // Integral of 2x over [0, 2] sampled at dx = 0.5
    assert_relative_eq!(trapezoid_nd(&field, 0.5), 4.0, epsilon = 1e-12);

    let plane = ArrayD::from_elem(IxDyn(&[3, 4]), 2.0);
    assert_relative_eq!(trapezoid_nd(&plane, 1.0), 12.0, epsilon = 1e-12);
}

/// Test that pair slots index the axis-pair list in either argument order.
#[test]
fn test_pair_slot_matches_axis_pairs() {
    for dim in 2..=3 {
        for (slot, &(i, j)) in axis_pairs(dim).iter().enumerate() {
            assert_eq!(pair_slot(i, j, dim), slot);
            assert_eq!(pair_slot(j, i, dim), slot);
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Test that a stationary curvature does not depend on the fine-grid resolution.
#[test]
fn test_resolution_increase_preserves_stationary_estimate() {
    let data = white_noise(&[30], 3, 1);
    let fwhm = 3.0;
    let sigma = fwhm_to_sigma(fwhm);
    let expected = 17.0 / (sigma * 2.0_f64.sqrt());

    for res_add in [0, 1, 3] {
        let result = estimate_lkc(
            &data,
            &LkcConfig {
                fwhm: vec![fwhm],
                res_add,
                remove: 6,
                theory: true,
            },
        )
        .unwrap();

        assert_eq!(result.geometry.shape()[0], 17 * (res_add + 1) + 1);
        let theory = result.true_lkc.unwrap()[0].unwrap();
        assert_relative_eq!(theory, expected, max_relative = 1e-3);
    }
}

/// Test that finer grids move the curvature monotonically toward its limit.
///
/// With a narrow kernel the white-noise metric oscillates between lattice
/// points, so the coarse trapezoid sum is biased.
#[test]
fn test_resolution_increase_converges() {
    let data = white_noise(&[40], 3, 4);
    let theory_at = |res_add: usize| {
        estimate_lkc(
            &data,
            &LkcConfig {
                fwhm: vec![1.5],
                res_add,
                remove: 4,
                theory: true,
            },
        )
        .unwrap()
        .true_lkc
        .unwrap()[0]
            .unwrap()
    };

    let reference = theory_at(7);
    let errors: Vec<f64> = [0, 1, 3]
        .iter()
        .map(|&r| (theory_at(r) - reference).abs())
        .collect();

    assert!(errors[0] > errors[1]);
    assert!(errors[1] >= errors[2]);
}

// ============================================================================
// Three Dimensions
// ============================================================================

/// Test that only the volume term is computed in 3-D.
#[test]
fn test_three_dimensional_volume_only() {
    let data = white_noise(&[6, 6, 6], 10, 3);
    let result = LkcBuilder::new()
        .fwhm(2.0)
        .build()
        .unwrap()
        .estimate(&data)
        .unwrap();

    assert_eq!(result.lkc.len(), 3);
    assert!(result.lkc[0].is_none());
    assert!(result.lkc[1].is_none());
    assert!(result.get(3).unwrap() > 0.0);
    assert!(!result.is_complete());
    assert!(result.true_lkc.is_none());
}

// ============================================================================
// Validation
// ============================================================================

/// Test input and configuration errors.
#[test]
fn test_lkc_errors() {
    let four_d = white_noise(&[2, 2, 2, 2], 3, 0);
    assert!(matches!(
        LkcBuilder::new().fwhm(2.0).build().unwrap().estimate(&four_d),
        Err(FieldError::UnsupportedDimension { dim: 4, .. })
    ));

    assert!(matches!(
        LkcBuilder::new().fwhm(0.0).build(),
        Err(FieldError::InvalidKernel(_))
    ));

    let data = white_noise(&[10, 10], 3, 0);
    assert!(matches!(
        LkcBuilder::new()
            .anisotropic_fwhm(vec![2.0, 2.0, 2.0])
            .build()
            .unwrap()
            .estimate(&data),
        Err(FieldError::InvalidKernel(_))
    ));

    assert!(matches!(
        LkcBuilder::new().fwhm(2.0).remove(5).build().unwrap().estimate(&data),
        Err(FieldError::InvalidInput(_))
    ));

    let one_subject = white_noise(&[10], 1, 0);
    assert!(matches!(
        LkcBuilder::new().fwhm(2.0).build().unwrap().estimate(&one_subject),
        Err(FieldError::TooFewSubjects { got: 1, .. })
    ));

    assert!(matches!(
        LkcBuilder::new().build(),
        Err(FieldError::InvalidParameter { parameter: "fwhm", .. })
    ));
}

/// Test that identical subjects give zero curvature.
#[test]
fn test_identical_subjects_give_zero() {
    let data = ArrayD::from_shape_fn(IxDyn(&[20, 2]), |idx| (idx[0] as f64 * 0.7).sin());
    let data = LatticeField::new(data).unwrap();
    let result = LkcBuilder::new().fwhm(3.0).build().unwrap().estimate(&data).unwrap();

    assert_eq!(result.get(1), Some(0.0));
    assert!(result.geometry.var_field.iter().all(|&v| v == 0.0));
}
