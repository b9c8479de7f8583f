//! Triangulation of rectangular grids and surface integration.
//!
//! ## Purpose
//!
//! Integrates a scalar field sampled on a 2-D rectilinear grid by
//! triangulating the grid and integrating the piecewise-linear interpolant.
//!
//! ## Key concepts
//!
//! * **Grid triangulation**: Each cell `(i, j)-(i+1, j+1)` is split along its
//!   `(i, j)-(i+1, j+1)` diagonal. For a rectilinear grid this is a Delaunay
//!   triangulation (ties on square cells resolved by the fixed diagonal).
//! * **Linear integral**: The integral of a linear function over a triangle is
//!   its area times the mean of the three vertex values.
//!
//! ## Invariants
//!
//! * Point `i * ny + j` is `(xs[i], ys[j])`, the row-major order of an
//!   `[nx, ny]` array.

// Internal dependencies
use crate::primitives::errors::FieldError;

/// Points and triangles of a triangulated grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    /// Vertex coordinates.
    pub points: Vec<[f64; 2]>,
    /// Vertex indices of each triangle.
    pub triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    /// Area of one triangle.
    pub fn area(&self, t: usize) -> f64 {
        let [a, b, c] = self.triangles[t];
        let (pa, pb, pc) = (self.points[a], self.points[b], self.points[c]);
        0.5 * ((pb[0] - pa[0]) * (pc[1] - pa[1]) - (pc[0] - pa[0]) * (pb[1] - pa[1])).abs()
    }

    /// Total area covered.
    pub fn total_area(&self) -> f64 {
        (0..self.triangles.len()).map(|t| self.area(t)).sum()
    }
}

/// Triangulate the grid spanned by `xs` and `ys`.
pub fn triangulate_grid(xs: &[f64], ys: &[f64]) -> Triangulation {
    let (nx, ny) = (xs.len(), ys.len());
    let points = xs
        .iter()
        .flat_map(|&x| ys.iter().map(move |&y| [x, y]))
        .collect();

    let mut triangles = Vec::with_capacity(2 * nx.saturating_sub(1) * ny.saturating_sub(1));
    for i in 0..nx.saturating_sub(1) {
        for j in 0..ny.saturating_sub(1) {
            let p00 = i * ny + j;
            let p01 = p00 + 1;
            let p10 = p00 + ny;
            let p11 = p10 + 1;
            triangles.push([p00, p10, p11]);
            triangles.push([p00, p11, p01]);
        }
    }

    Triangulation { points, triangles }
}

/// Integrate vertex values over a triangulation.
pub fn integrate_over_triangulation(tri: &Triangulation, values: &[f64]) -> Result<f64, FieldError> {
    if values.len() != tri.points.len() {
        return Err(FieldError::ShapeMismatch {
            what: "triangulation values",
            expected: format!("{} vertex values", tri.points.len()),
            got: format!("{} values", values.len()),
        });
    }

    Ok(tri
        .triangles
        .iter()
        .enumerate()
        .map(|(t, &[a, b, c])| tri.area(t) * (values[a] + values[b] + values[c]) / 3.0)
        .sum())
}
