//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides pure mathematical functions:
//! - Gaussian and explicit smoothing kernels with derivatives
//! - One-sample t-statistics and sample covariances
//! - Forward-difference derivative generation
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// Smoothing kernels.
pub mod kernel;

/// Summary statistics over the subject axis.
pub mod stats;

/// Finite-difference derivatives.
pub mod derivatives;
