//! Layer 4: Engine
//!
//! # Purpose
//!
//! This layer orchestrates the three operations by coordinating primitives,
//! math and algorithms: the continuous t-field, peak localisation and LKC
//! estimation. It owns input validation and the result types.
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine ← You are here
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Validation utilities.
pub mod validator;

/// Output types for all operations.
pub mod output;

/// Continuous t-field.
pub mod tfield;

/// Peak localisation.
pub mod peaks;

/// LKC estimation.
pub mod lkc;
