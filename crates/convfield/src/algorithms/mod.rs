//! Layer 3: Algorithms
//!
//! # Purpose
//!
//! This layer provides the numerical building blocks the engines combine:
//! - Continuous convolution-field evaluation at arbitrary points
//! - Separable discrete convolution on upsampled grids
//! - Lattice local-maxima extraction
//! - Newton-Raphson root finding and box-constrained ascent
//! - Grid triangulation and surface integration
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine
//!   ↓
//! Layer 3: Algorithms ← You are here
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Continuous convolution fields.
pub mod convolution;

/// Separable discrete convolution.
pub mod smoothing;

/// Lattice local maxima.
pub mod maxima;

/// Newton-Raphson root finding.
pub mod newton;

/// Box-constrained maximisation.
pub mod optimize;

/// Grid triangulation and integration.
pub mod triangulation;
