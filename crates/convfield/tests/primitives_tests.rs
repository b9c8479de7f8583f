#![cfg(feature = "dev")]
//! Tests for data containers and grid utilities.
//!
//! These tests verify the primitives layer:
//! - Lattice construction, voxel ordering and shape errors
//! - Coordinate vector resolution and extrapolation
//! - Zero-insert upsampling and edge trimming
//! - Row-major index helpers
//!
//! ## Test Organization
//!
//! 1. **Lattice Field** - Construction and layout
//! 2. **Coordinates** - Unit, partial and invalid axes
//! 3. **Fine Grid** - Upsampling and trimming
//! 4. **Index Helpers** - ravel / unravel

use approx::assert_relative_eq;
use ndarray::{ArrayD, IxDyn};

use convfield::internals::primitives::coords::CoordinateVectors;
use convfield::internals::primitives::errors::FieldError;
use convfield::internals::primitives::grid::{
    fine_axis, fine_spacing, trim_edges, upsample_zero_insert, upsampled_len,
};
use convfield::internals::primitives::lattice::{
    full_mask, ravel_index, row_major_strides, unravel_index, LatticeField,
};

// ============================================================================
// Lattice Field
// ============================================================================

/// Test shape accessors and the voxel-by-subject layout.
#[test]
fn test_lattice_layout() {
    let data = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4]), |idx| {
        (100 * idx[0] + 10 * idx[1] + idx[2]) as f64
    });
    let lattice = LatticeField::new(data).unwrap();

    assert_eq!(lattice.dim(), 2);
    assert_eq!(lattice.spatial_shape(), &[2, 3]);
    assert_eq!(lattice.nsubj(), 4);
    assert_eq!(lattice.n_voxels(), 6);

    let voxels = lattice.voxels();
    // Row 4 is spatial index (1, 1)
    assert_eq!(voxels[[4, 0]], 110.0);
    assert_eq!(voxels[[4, 3]], 113.0);
    assert_eq!(lattice.subject(2)[[1, 2]], 122.0);
}

/// Test construction from a flat buffer with subjects varying fastest.
#[test]
fn test_lattice_from_vec() {
    let lattice = LatticeField::from_vec(&[3], 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(lattice.voxels()[[1, 0]], 3.0);
    assert_eq!(lattice.voxels()[[1, 1]], 4.0);

    let err = LatticeField::from_vec(&[3], 2, vec![1.0; 5]).unwrap_err();
    assert!(matches!(err, FieldError::ShapeMismatch { .. }));
}

/// Test lattice construction errors.
#[test]
fn test_lattice_errors() {
    let flat = ArrayD::<f64>::zeros(IxDyn(&[5]));
    assert!(matches!(
        LatticeField::new(flat),
        Err(FieldError::ShapeMismatch { .. })
    ));

    let empty = ArrayD::<f64>::zeros(IxDyn(&[0, 3]));
    assert_eq!(LatticeField::new(empty), Err(FieldError::EmptyInput));
}

/// Test wrapping a single-subject field.
#[test]
fn test_single_subject() {
    let field = ArrayD::from_elem(IxDyn(&[4, 4]), 1.5);
    let lattice = LatticeField::single_subject(field).unwrap();
    assert_eq!(lattice.dim(), 2);
    assert_eq!(lattice.nsubj(), 1);
}

// ============================================================================
// Coordinates
// ============================================================================

/// Test default unit coordinates starting at 1.
#[test]
fn test_unit_coordinates() {
    let coords = CoordinateVectors::resolve(None, &[3, 2]).unwrap();
    assert_eq!(coords.dim(), 2);
    assert_eq!(coords.axis(0), &[1.0, 2.0, 3.0]);
    assert_eq!(coords.coordinate(&[2, 1]), vec![3.0, 2.0]);
    assert_eq!(coords.bounds(), vec![(1.0, 3.0), (1.0, 2.0)]);
}

/// Test that missing axes continue the first axis.
#[test]
fn test_partial_coordinates_extend_first_axis() {
    let supplied = vec![vec![0.0, 0.5, 1.0]];
    let coords = CoordinateVectors::resolve(Some(supplied.as_slice()), &[3, 4]).unwrap();

    assert_eq!(coords.dim(), 2);
    let axis1 = coords.axis(1);
    assert_eq!(axis1.len(), 4);
    for (k, &v) in axis1.iter().enumerate() {
        assert_relative_eq!(v, 0.5 * k as f64, epsilon = 1e-15);
    }
}

/// Test bounds for a decreasing axis.
#[test]
fn test_decreasing_axis_bounds() {
    let supplied = vec![vec![3.0, 2.0, 1.0]];
    let coords = CoordinateVectors::resolve(Some(supplied.as_slice()), &[3]).unwrap();
    assert_eq!(coords.bounds(), vec![(1.0, 3.0)]);
}

/// Test coordinate vector validation.
#[test]
fn test_coordinate_errors() {
    let wrong_len = vec![vec![1.0, 2.0]];
    assert!(matches!(
        CoordinateVectors::resolve(Some(wrong_len.as_slice()), &[3]),
        Err(FieldError::ShapeMismatch { .. })
    ));

    let too_many = vec![vec![1.0], vec![1.0]];
    assert!(matches!(
        CoordinateVectors::resolve(Some(too_many.as_slice()), &[1]),
        Err(FieldError::ShapeMismatch { .. })
    ));

    let non_finite = vec![vec![1.0, f64::NAN]];
    assert!(matches!(
        CoordinateVectors::resolve(Some(non_finite.as_slice()), &[2]),
        Err(FieldError::InvalidNumericValue(_))
    ));
}

// ============================================================================
// Fine Grid
// ============================================================================

/// Test zero-insert upsampling of a 1-D field with a subject axis.
#[test]
fn test_upsample_zero_insert() {
    let data = ArrayD::from_shape_vec(IxDyn(&[3, 1]), vec![1.0, 2.0, 3.0]).unwrap();
    let fine = upsample_zero_insert(&data.view(), 1, 1);

    assert_eq!(fine.shape(), &[5, 1]);
    let values: Vec<f64> = fine.iter().copied().collect();
    assert_eq!(values, vec![1.0, 0.0, 2.0, 0.0, 3.0]);

    let unchanged = upsample_zero_insert(&data.view(), 0, 1);
    assert_eq!(unchanged, data);
}

/// Test fine-grid lengths and spacing.
#[test]
fn test_fine_grid_sizes() {
    assert_eq!(upsampled_len(10, 0), 10);
    assert_eq!(upsampled_len(10, 2), 28);
    assert_relative_eq!(fine_spacing(3), 0.25, epsilon = 1e-15);
    assert_eq!(fine_axis(3, 0.5), vec![0.0, 0.5, 1.0]);
}

/// Test edge trimming and its error when nothing would remain.
#[test]
fn test_trim_edges() {
    let field = ArrayD::from_shape_fn(IxDyn(&[6, 2]), |idx| (idx[0] * 2 + idx[1]) as f64);
    let trimmed = trim_edges(&field, 2, 1).unwrap();
    assert_eq!(trimmed.shape(), &[2, 2]);
    assert_eq!(trimmed[[0, 0]], 4.0);

    assert!(matches!(
        trim_edges(&field, 3, 1),
        Err(FieldError::InvalidInput(_))
    ));
}

// ============================================================================
// Index Helpers
// ============================================================================

/// Test row-major index conversions.
#[test]
fn test_ravel_unravel() {
    let shape = [2, 3, 4];
    assert_eq!(row_major_strides(&shape), vec![12, 4, 1]);
    for flat in 0..24 {
        let idx = unravel_index(flat, &shape);
        assert_eq!(ravel_index(&idx, &shape), flat);
    }
    assert_eq!(unravel_index(17, &shape), vec![1, 1, 1]);
    assert!(full_mask(&[2, 2]).iter().all(|&m| m));
}
