//! Layer 1: Primitives
//!
//! # Purpose
//!
//! This layer provides the data containers and index utilities used
//! throughout the crate. It has zero internal dependencies within the crate.
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
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives ← You are here
//! ```

/// Shared error types.
pub mod errors;

/// Multi-subject lattice container and index helpers.
pub mod lattice;

/// Per-axis coordinate vectors.
pub mod coords;

/// Zero-insert upsampling and edge trimming.
pub mod grid;
