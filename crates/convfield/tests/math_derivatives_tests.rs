#![cfg(feature = "dev")]
//! Tests for the finite-difference derivative generator.
//!
//! These tests verify forward-difference Jacobians and second derivatives:
//! - Accuracy on polynomials at several evaluation points
//! - Output shapes for vector-valued functions
//! - Rejection of unsupported dimensions, bad steps and bad outputs
//!
//! ## Test Organization
//!
//! 1. **Scalar Derivatives** - `x^2` and friends
//! 2. **Vector Functions** - Jacobian layout
//! 3. **Error Handling** - Shape and numeric validation

use approx::assert_abs_diff_eq;

use convfield::internals::math::derivatives::{
    make_derivatives, make_scalar_derivatives, DEFAULT_STEP,
};
use convfield::internals::primitives::errors::FieldError;

// ============================================================================
// Scalar Derivatives
// ============================================================================

/// Test first and second derivatives of x^2.
///
/// Verifies f'(x) = 2x and f''(x) = 2 at x = 1, 5, 10.
#[test]
fn test_square_first_and_second_derivative() {
    let d = make_derivatives(|x: &[f64]| vec![x[0] * x[0]], 1, None).unwrap();
    assert_eq!(d.step(), DEFAULT_STEP);
    assert_eq!(d.dim(), 1);

    for &x in &[1.0, 5.0, 10.0] {
        let j = d.fprime(&[x]).unwrap();
        assert_eq!(j.shape(), &[1, 1]);
        assert_abs_diff_eq!(j[[0, 0]], 2.0 * x, epsilon = 1e-3);

        let h = d.fprime2(&[x]).unwrap();
        assert_eq!(h.shape(), &[1, 1, 1]);
        assert_abs_diff_eq!(h[[0, 0, 0]], 2.0, epsilon = 1e-3);
    }
}

/// Test gradient and Hessian of a 2-D quadratic form.
#[test]
fn test_scalar_gradient_and_hessian_2d() {
    // f = x^2 + 3xy + 2y^2
    let d = make_scalar_derivatives(
        |p: &[f64]| p[0] * p[0] + 3.0 * p[0] * p[1] + 2.0 * p[1] * p[1],
        2,
        Some(1e-5),
    )
    .unwrap();

    let g = d.gradient(&[1.0, -1.0]).unwrap();
    assert_abs_diff_eq!(g[0], 2.0 - 3.0, epsilon = 1e-3);
    assert_abs_diff_eq!(g[1], 3.0 - 4.0, epsilon = 1e-3);

    let h = d.hessian(&[1.0, -1.0]).unwrap();
    assert_abs_diff_eq!(h[[0, 0]], 2.0, epsilon = 1e-2);
    assert_abs_diff_eq!(h[[0, 1]], 3.0, epsilon = 1e-2);
    assert_abs_diff_eq!(h[[1, 0]], 3.0, epsilon = 1e-2);
    assert_abs_diff_eq!(h[[1, 1]], 4.0, epsilon = 1e-2);
}

/// Test a 3-D function.
#[test]
fn test_three_dimensional_gradient() {
    let d = make_scalar_derivatives(|p: &[f64]| p[0] + 2.0 * p[1] - p[2] * p[2], 3, None).unwrap();
    let g = d.gradient(&[0.0, 0.0, 2.0]).unwrap();
    assert_abs_diff_eq!(g[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(g[1], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(g[2], -4.0, epsilon = 1e-3);
}

// ============================================================================
// Vector Functions
// ============================================================================

/// Test the Jacobian layout of a vector-valued function.
///
/// Row i is output i, column k is input k.
#[test]
fn test_vector_jacobian_layout() {
    let d = make_derivatives(|p: &[f64]| vec![p[0] * p[1], p[0] + p[1] * p[1]], 2, None).unwrap();

    let j = d.fprime(&[1.0, 2.0]).unwrap();
    assert_eq!(j.shape(), &[2, 2]);
    assert_abs_diff_eq!(j[[0, 0]], 2.0, epsilon = 1e-3);
    assert_abs_diff_eq!(j[[0, 1]], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(j[[1, 0]], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(j[[1, 1]], 4.0, epsilon = 1e-3);

    let h = d.fprime2(&[1.0, 2.0]).unwrap();
    assert_eq!(h.shape(), &[2, 2, 2]);
    assert_abs_diff_eq!(h[[1, 1, 1]], 2.0, epsilon = 1e-2);
    assert_abs_diff_eq!(h[[0, 0, 1]], 1.0, epsilon = 1e-2);
}

// ============================================================================
// Error Handling
// ============================================================================

/// Test that dimensions outside 1..=3 are rejected.
#[test]
fn test_unsupported_dimension() {
    let err = make_derivatives(|x: &[f64]| vec![x[0]], 4, None).unwrap_err();
    assert!(matches!(err, FieldError::UnsupportedDimension { dim: 4, .. }));

    let err = make_derivatives(|x: &[f64]| vec![x[0]], 0, None).unwrap_err();
    assert!(matches!(err, FieldError::UnsupportedDimension { dim: 0, .. }));
}

/// Test that a point of the wrong length is a shape error.
#[test]
fn test_point_length_mismatch() {
    let d = make_derivatives(|x: &[f64]| vec![x[0]], 2, None).unwrap();
    assert!(matches!(
        d.fprime(&[1.0]),
        Err(FieldError::ShapeMismatch { .. })
    ));
}

/// Test that non-positive steps are rejected.
#[test]
fn test_invalid_step() {
    for h in [0.0, -1e-4, f64::NAN] {
        let err = make_derivatives(|x: &[f64]| vec![x[0]], 1, Some(h)).unwrap_err();
        assert!(matches!(err, FieldError::InvalidParameter { parameter: "h", .. }));
    }
}

/// Test that empty or non-finite outputs are rejected.
#[test]
fn test_invalid_outputs() {
    let empty = make_derivatives(|_: &[f64]| Vec::new(), 1, None).unwrap();
    assert!(matches!(
        empty.fprime(&[0.0]),
        Err(FieldError::InvalidNumericValue(_))
    ));

    let log = make_derivatives(|x: &[f64]| vec![x[0].ln()], 1, None).unwrap();
    assert!(matches!(
        log.fprime(&[-1.0]),
        Err(FieldError::InvalidNumericValue(_))
    ));
}
