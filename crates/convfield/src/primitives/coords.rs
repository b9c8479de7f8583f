//! Per-axis coordinate vectors.
//!
//! ## Purpose
//!
//! Maps lattice indices to physical coordinates in the continuous domain.
//! Axes may be irregularly spaced; missing axes are extrapolated from the
//! first axis's start and increment.
//!
//! ## Invariants
//!
//! * After resolution there is exactly one vector per spatial axis.
//! * Vector `d` has length `Ld` and only finite entries.

// Internal dependencies
use crate::primitives::errors::FieldError;

// ============================================================================
// Coordinate Vectors
// ============================================================================

/// Physical coordinates of each lattice index, one vector per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateVectors {
    axes: Vec<Vec<f64>>,
}

impl CoordinateVectors {
    /// Unit spacing starting at 1 on every axis.
    pub fn unit(shape: &[usize]) -> Self {
        Self {
            axes: shape
                .iter()
                .map(|&l| (1..=l).map(|i| i as f64).collect())
                .collect(),
        }
    }

    /// Resolve user-supplied (possibly partial) axes against a lattice shape.
    ///
    /// Supplied axes must match the lattice length on their axis. Axes beyond
    /// those supplied continue the first axis: same start, same increment.
    pub fn resolve(partial: Option<&[Vec<f64>]>, shape: &[usize]) -> Result<Self, FieldError> {
        let supplied = match partial {
            None => return Ok(Self::unit(shape)),
            Some(axes) if axes.is_empty() => return Ok(Self::unit(shape)),
            Some(axes) => axes,
        };

        if supplied.len() > shape.len() {
            return Err(FieldError::ShapeMismatch {
                what: "coordinate vectors",
                expected: format!("at most {} axes", shape.len()),
                got: format!("{} axes", supplied.len()),
            });
        }

        for (d, axis) in supplied.iter().enumerate() {
            if axis.len() != shape[d] {
                return Err(FieldError::ShapeMismatch {
                    what: "coordinate vector length",
                    expected: format!("{} entries on axis {d}", shape[d]),
                    got: format!("{} entries", axis.len()),
                });
            }
            if let Some(pos) = axis.iter().position(|v| !v.is_finite()) {
                return Err(FieldError::InvalidNumericValue(format!(
                    "coordinate[{d}][{pos}]={}",
                    axis[pos]
                )));
            }
        }

        let start = supplied[0][0];
        let step = if supplied[0].len() > 1 {
            supplied[0][1] - supplied[0][0]
        } else {
            1.0
        };

        let mut axes = supplied.to_vec();
        for &len in &shape[supplied.len()..] {
            axes.push((0..len).map(|k| start + k as f64 * step).collect());
        }

        Ok(Self { axes })
    }

    /// Number of axes.
    #[inline]
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// Coordinates along one axis.
    #[inline]
    pub fn axis(&self, d: usize) -> &[f64] {
        &self.axes[d]
    }

    /// Physical location of a lattice multi-index.
    pub fn coordinate(&self, index: &[usize]) -> Vec<f64> {
        index
            .iter()
            .enumerate()
            .map(|(d, &i)| self.axes[d][i])
            .collect()
    }

    /// Box bounds `(first, last)` per axis, ordered so that `lo <= hi`.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.axes
            .iter()
            .map(|a| {
                let first = a[0];
                let last = a[a.len() - 1];
                (first.min(last), first.max(last))
            })
            .collect()
    }
}
