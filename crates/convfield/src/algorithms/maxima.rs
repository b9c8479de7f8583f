//! Local maxima on a lattice.
//!
//! ## Purpose
//!
//! Finds the largest strict local maxima of a spatial field restricted to a
//! mask. Used to seed continuous peak refinement.
//!
//! ## Key concepts
//!
//! * **Neighbourhood**: Full `3^D - 1` connectivity; neighbours outside the
//!   lattice, outside the mask or with a non-finite value are ignored.
//! * **Strict**: A voxel is a maximum only if it exceeds every in-mask
//!   neighbour, so flat plateaus yield no maxima.
//! * **Ordering**: Descending value; ties by ascending row-major flat index.
//!
//! ## Invariants
//!
//! * Returned indices are in-mask and finite-valued.

// External dependencies
use core::cmp::Ordering;
use ndarray::ArrayViewD;

// Internal dependencies
use crate::primitives::lattice::unravel_index;

/// All offsets in `{-1, 0, 1}^D` except the origin.
fn neighbour_offsets(dim: usize) -> Vec<Vec<isize>> {
    let total = 3usize.pow(dim as u32);
    (0..total)
        .map(|code| {
            let mut c = code;
            (0..dim)
                .map(|_| {
                    let o = (c % 3) as isize - 1;
                    c /= 3;
                    o
                })
                .collect::<Vec<isize>>()
        })
        .filter(|o| o.iter().any(|&v| v != 0))
        .collect()
}

/// Flat indices of all strict in-mask local maxima, in row-major order.
pub fn local_maxima(field: &ArrayViewD<'_, f64>, mask: &ArrayViewD<'_, bool>) -> Vec<usize> {
    let shape = field.shape().to_vec();
    let offsets = neighbour_offsets(shape.len());
    let mut found = Vec::new();

    for (flat, (value, &inside)) in field.iter().zip(mask.iter()).enumerate() {
        if !inside || !value.is_finite() {
            continue;
        }
        let index = unravel_index(flat, &shape);

        let is_max = offsets.iter().all(|off| {
            let mut neighbour = Vec::with_capacity(shape.len());
            for (d, &o) in off.iter().enumerate() {
                let j = index[d] as isize + o;
                if j < 0 || j >= shape[d] as isize {
                    return true;
                }
                neighbour.push(j as usize);
            }
            let at = neighbour.as_slice();
            !mask[at] || !field[at].is_finite() || field[at] < *value
        });

        if is_max {
            found.push(flat);
        }
    }
    found
}

/// Multi-indices of the `k` largest local maxima.
///
/// Returns fewer than `k` entries when the field has fewer maxima.
pub fn top_k_local_maxima(
    field: &ArrayViewD<'_, f64>,
    k: usize,
    mask: &ArrayViewD<'_, bool>,
) -> Vec<Vec<usize>> {
    let values: Vec<f64> = field.iter().copied().collect();
    let mut maxima = local_maxima(field, mask);

    maxima.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    maxima.truncate(k);

    maxima
        .into_iter()
        .map(|flat| unravel_index(flat, field.shape()))
        .collect()
}
