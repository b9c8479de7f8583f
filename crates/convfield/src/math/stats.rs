//! One-sample summary statistics over a subject axis.
//!
//! ## Purpose
//!
//! Computes the one-sample t-statistic, mean, standard deviation and Cohen's d
//! of a set of subject values, plus sample covariances for the LKC estimator.
//!
//! ## Design notes
//!
//! * **Two-pass**: Mean first, then centred sums, in index order. The result is
//!   bit-reproducible for a given subject order.
//! * **Divisor**: Sample variance and covariance use `n - 1`.
//!
//! ## Key concepts
//!
//! * **t-statistic**: `mean / (sd / sqrt(n))`.
//! * **Cohen's d**: `mean / sd`.
//! * **Degenerate points**: When `sd == 0` both ratios are `±inf` following the
//!   sign of the mean, or `NaN` for a zero mean. Bit-identical subject values
//!   always give `sd == 0`, whatever rounding the mean picked up.

// External dependencies
use ndarray::{ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis, IxDyn};
use num_traits::Float;

// ============================================================================
// Point Statistics
// ============================================================================

/// Summary of one point's subject values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStats<T> {
    /// One-sample t-statistic.
    pub tstat: T,
    /// Sample mean.
    pub mean: T,
    /// Sample standard deviation (divisor `n - 1`).
    pub sd: T,
    /// Cohen's d.
    pub cohens_d: T,
}

impl<T: Float> PointStats<T> {
    /// Whether the standard deviation is exactly zero.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.sd == T::zero()
    }
}

/// Compute the summary statistics of a set of subject values.
///
/// Requires at least two values; with fewer the standard deviation is `NaN`.
pub fn summarize<T: Float>(values: ArrayView1<'_, T>) -> PointStats<T> {
    let n = T::from(values.len()).unwrap();
    let mean = values.iter().fold(T::zero(), |acc, &v| acc + v) / n;
    let ss = values
        .iter()
        .fold(T::zero(), |acc, &v| acc + (v - mean) * (v - mean));
    let identical = values.len() > 1 && values.iter().all(|&v| v == values[0]);
    let sd = if identical {
        T::zero()
    } else {
        (ss / (n - T::one())).sqrt()
    };

    let (tstat, cohens_d) = if sd == T::zero() {
        let ratio = degenerate_ratio(mean);
        (ratio, ratio)
    } else {
        (mean / (sd / n.sqrt()), mean / sd)
    };

    PointStats {
        tstat,
        mean,
        sd,
        cohens_d,
    }
}

/// Value of `mean / 0`: signed infinity, or `NaN` when the mean is zero.
#[inline]
fn degenerate_ratio<T: Float>(mean: T) -> T {
    if mean > T::zero() {
        T::infinity()
    } else if mean < T::zero() {
        T::neg_infinity()
    } else {
        T::nan()
    }
}

// ============================================================================
// Matrix Statistics
// ============================================================================

/// Statistics for every row of a `points x subjects` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct TStatistics<T> {
    /// t-statistic per row.
    pub tstat: Vec<T>,
    /// Mean per row.
    pub mean: Vec<T>,
    /// Standard deviation per row.
    pub sd: Vec<T>,
    /// Cohen's d per row.
    pub cohens_d: Vec<T>,
}

/// One-sample t-statistic reducing over the subject (column) axis.
pub fn t_stat<T: Float>(samples: ArrayView2<'_, T>) -> TStatistics<T> {
    let m = samples.nrows();
    let mut out = TStatistics {
        tstat: Vec::with_capacity(m),
        mean: Vec::with_capacity(m),
        sd: Vec::with_capacity(m),
        cohens_d: Vec::with_capacity(m),
    };

    for row in samples.outer_iter() {
        let s = summarize(row);
        out.tstat.push(s.tstat);
        out.mean.push(s.mean);
        out.sd.push(s.sd);
        out.cohens_d.push(s.cohens_d);
    }
    out
}

/// Lattice t-statistic: reduce an `[L1, .., LD, nsubj]` array over its last axis.
pub fn t_stat_lattice<T: Float>(data: &ArrayViewD<'_, T>) -> ArrayD<T> {
    let last = data.ndim() - 1;
    let spatial: Vec<usize> = data.shape()[..last].to_vec();
    let values: Vec<T> = data
        .lanes(Axis(last))
        .into_iter()
        .map(|lane| summarize(lane).tstat)
        .collect();

    ArrayD::from_shape_vec(IxDyn(&spatial), values)
        .unwrap_or_else(|_| ArrayD::from_elem(IxDyn(&spatial), T::nan()))
}

// ============================================================================
// Covariance
// ============================================================================

/// Sample covariance of two equally long sequences (divisor `n - 1`).
pub fn sample_covariance<T: Float>(a: ArrayView1<'_, T>, b: ArrayView1<'_, T>) -> T {
    let n = T::from(a.len()).unwrap();
    let mean_a = a.iter().fold(T::zero(), |acc, &v| acc + v) / n;
    let mean_b = b.iter().fold(T::zero(), |acc, &v| acc + v) / n;

    a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (&x, &y)| acc + (x - mean_a) * (y - mean_b))
        / (n - T::one())
}

/// Covariance along the last axis of two arrays of identical shape.
pub fn covariance_field(a: &ArrayViewD<'_, f64>, b: &ArrayViewD<'_, f64>) -> ArrayD<f64> {
    let last = a.ndim() - 1;
    let spatial: Vec<usize> = a.shape()[..last].to_vec();
    let mut out = ArrayD::<f64>::zeros(IxDyn(&spatial));

    ndarray::Zip::from(&mut out)
        .and(a.lanes(Axis(last)))
        .and(b.lanes(Axis(last)))
        .for_each(|o, la, lb| *o = sample_covariance(la, lb));
    out
}
