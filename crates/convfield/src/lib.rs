//! # convfield — Continuous convolution fields for Rust
//!
//! Treats a discretely sampled, multi-subject field as a continuous function
//! by convolving it with a smoothing kernel, and builds on that to:
//!
//! - evaluate the one-sample **t-statistic field** at arbitrary points,
//! - locate **sub-voxel peaks** of the t-field,
//! - estimate the **Lipschitz-Killing curvatures** (LKCs) of the metric a
//!   smoothed Gaussian random field induces on its domain.
//!
//! ## What is a convolution field?
//!
//! Given lattice samples `Y(v)` and a kernel `K`, the convolution field is
//! `Y(x) = sum_v K(x - v) Y(v)`, defined at every real `x` and as smooth as
//! the kernel. With one such field per subject, the t-statistic across
//! subjects is itself a smooth field whose maxima can be found to sub-voxel
//! precision.
//!
//! ## Quick Start
//!
//! ### t-field
//!
//! ```rust
//! use convfield::prelude::*;
//! use ndarray::{Array2, ArrayD, IxDyn};
//!
//! // 1-D lattice of 20 points, 4 subjects (subject axis last)
//! let data = ArrayD::from_shape_fn(IxDyn(&[20, 4]), |idx| {
//!     let (i, s) = (idx[0] as f64, idx[1] as f64);
//!     (-(i - 10.0).powi(2) / 8.0).exp() + 0.1 * (s - 1.5)
//! });
//! let data = LatticeField::new(data)?;
//!
//! let processor = TField::new().fwhm(3.0).build()?;
//! let points = Array2::from_shape_vec((1, 3), vec![5.5, 10.25, 11.0]).unwrap();
//! let result = processor.evaluate(&data, &points)?;
//!
//! assert_eq!(result.len(), 3);
//! println!("{}", result);
//! # Result::<(), FieldError>::Ok(())
//! ```
//!
//! ### Peaks
//!
//! ```rust
//! use convfield::prelude::*;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let data = ArrayD::from_shape_fn(IxDyn(&[40, 5]), |idx| {
//!     let (i, s) = (idx[0] as f64, idx[1] as f64);
//!     (-(i - 20.0).powi(2) / 8.0).exp() + 0.05 * (s - 2.0)
//! });
//! let data = LatticeField::new(data)?;
//!
//! let peaks = Peaks::new()
//!     .fwhm(3.0)
//!     .peaks(1)
//!     .build()?
//!     .find(&data)?;
//!
//! assert!((peaks.peaks[0].location[0] - 21.0).abs() < 1.0);
//! # Result::<(), FieldError>::Ok(())
//! ```
//!
//! ### LKCs
//!
//! ```rust
//! use convfield::prelude::*;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let data = ArrayD::from_shape_fn(IxDyn(&[30, 6]), |idx| {
//!     ((idx[0] * 7 + idx[1] * 13) % 11) as f64 - 5.0
//! });
//! let data = LatticeField::new(data)?;
//!
//! let result = Lkc::new().fwhm(4.0).res_add(1).theory(true).build()?.estimate(&data)?;
//! assert!(result.lkc[0].unwrap() > 0.0);
//! println!("{}", result);
//! # Result::<(), FieldError>::Ok(())
//! ```
//!
//! ### Finite-difference derivatives
//!
//! ```rust
//! use convfield::prelude::*;
//!
//! let d = make_derivatives(|x: &[f64]| vec![x[0] * x[0]], 1, None)?;
//! let slope = d.fprime(&[3.0])?;
//! assert!((slope[[0, 0]] - 6.0).abs() < 1e-3);
//! # Result::<(), FieldError>::Ok(())
//! ```
//!
//! ## Result and Error Handling
//!
//! Every operation returns `Result<_, FieldError>`. Shape mismatches,
//! non-finite lattice data, unsupported dimensions and refinement failures are
//! separate variants.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (per-peak state transitions at `debug`,
//! fallbacks and partial results at `warn`) and never installs a subscriber.
//!
//! ## References
//!
//! - Worsley, K. J. et al. (1996). "A unified statistical approach for determining significant signals in images of cerebral activation"
//! - Telschow, F. J. E. et al. (2023). "Estimation of expected Euler characteristic curves of nonstationary smooth random fields"
//!
//! ## License
//!
//! See the repository for license information and contribution guidelines.

// Layer 1: Primitives - data containers and grid utilities.
mod primitives;

// Layer 2: Math - kernels, statistics and finite differences.
mod math;

// Layer 3: Algorithms - convolution, maxima, solvers and integration.
mod algorithms;

// Layer 4: Engine - validation, orchestration and results.
mod engine;

// High-level fluent API.
mod api;

pub use api::*;

// Standard convfield prelude.
pub mod prelude {
    pub use crate::api::{
        make_derivatives, make_scalar_derivatives,
        DerivativeMethod::{Analytic, FiniteDifference},
        ExplicitKernel, FieldError, Kernel, LatticeField, LkcBuilder as Lkc, LkcResult,
        PeakFinderBuilder as Peaks, PeakResult, PeakSeeds,
        Refinement::{Constrained, RootFinding},
        TFieldBuilder as TField, TFieldResult, Truncation,
    };
}

// Internal modules for development and testing.
//
// This module re-exports internal modules for development and testing purposes.
// It is only available with the `dev` feature enabled.
#[cfg(feature = "dev")]
pub mod internals {
    pub mod primitives {
        pub use crate::primitives::*;
    }
    pub mod math {
        pub use crate::math::*;
    }
    pub mod algorithms {
        pub use crate::algorithms::*;
    }
    pub mod engine {
        pub use crate::engine::*;
    }
    pub mod api {
        pub use crate::api::*;
    }
}
