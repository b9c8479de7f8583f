//! Error types for convolution-field operations.
//!
//! ## Purpose
//!
//! This module defines the error conditions that can occur while evaluating
//! continuous t-fields, localising peaks, or estimating Lipschitz-Killing
//! curvatures.
//!
//! ## Design notes
//!
//! * **Contextual**: Errors carry the offending values (expected vs. actual shapes).
//! * **Distinguishable**: Shape problems, non-finite data and solver failures are
//!   separate variants so callers can tell a data problem from a solver problem.
//! * **Deferred**: Builder misuse is recorded at configuration time and reported
//!   by `build()`.
//!
//! ## Key concepts
//!
//! 1. **Input-shape errors**: Coordinate vectors, masks or query points that do
//!    not match the lattice; unsupported dimensionality.
//! 2. **Numerical-validity errors**: Lattice data containing NaN or infinity.
//! 3. **Convergence failures**: Peak refinement that exhausted its retry budget.
//!
//! ## Non-goals
//!
//! * This module does not perform the validation logic itself.
//! * This module does not provide recovery strategies.

// External dependencies
use core::fmt::{Display, Formatter, Result};
use std::error::Error;
use std::string::String;

// ============================================================================
// Error Type
// ============================================================================

/// Error type for convolution-field operations.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Input lattice has no samples.
    EmptyInput,

    /// Number of spatial dimensions is outside the supported range.
    UnsupportedDimension {
        /// Requested number of spatial dimensions.
        dim: usize,
        /// Largest supported number of spatial dimensions.
        max: usize,
        /// Operation that rejected the dimension.
        operation: &'static str,
    },

    /// Two inputs that must agree in shape do not.
    ShapeMismatch {
        /// Description of the mismatched input.
        what: &'static str,
        /// Expected shape or length.
        expected: String,
        /// Shape or length that was provided.
        got: String,
    },

    /// Lattice data contains a NaN or infinite value.
    MissingValues {
        /// Flat (row-major) index of the first offending value.
        index: usize,
    },

    /// A scalar input (coordinate, seed, function value) is not finite.
    InvalidNumericValue(String),

    /// The one-sample t-statistic needs at least two subjects.
    TooFewSubjects {
        /// Number of subjects provided.
        got: usize,
        /// Minimum required subjects.
        min: usize,
    },

    /// Kernel specification is unusable (e.g. non-positive FWHM).
    InvalidKernel(String),

    /// A configuration parameter is out of range.
    InvalidParameter {
        /// Name of the parameter.
        parameter: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Generic invalid input with a descriptive message.
    InvalidInput(String),

    /// Peak refinement exhausted its attempt budget without converging.
    NonConvergence {
        /// Index of the peak (in seed order) that failed.
        peak: usize,
        /// Number of Newton-Raphson attempts made.
        attempts: usize,
    },

    /// Parameter was set multiple times in the builder.
    DuplicateParameter {
        /// Name of the parameter that was set multiple times.
        parameter: &'static str,
    },
}

// ============================================================================
// Display Implementation
// ============================================================================

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::EmptyInput => write!(f, "Input lattice is empty"),
            Self::UnsupportedDimension {
                dim,
                max,
                operation,
            } => write!(
                f,
                "Unsupported dimension: {operation} is not implemented for D={dim} (max {max})"
            ),
            Self::ShapeMismatch {
                what,
                expected,
                got,
            } => write!(f, "Shape mismatch in {what}: expected {expected}, got {got}"),
            Self::MissingValues { index } => write!(
                f,
                "Cannot process missing values: non-finite lattice value at flat index {index}"
            ),
            Self::InvalidNumericValue(s) => write!(f, "Invalid numeric value: {s}"),
            Self::TooFewSubjects { got, min } => {
                write!(f, "Too few subjects: got {got}, need at least {min}")
            }
            Self::InvalidKernel(msg) => write!(f, "Invalid kernel: {msg}"),
            Self::InvalidParameter { parameter, reason } => {
                write!(f, "Invalid parameter '{parameter}': {reason}")
            }
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::NonConvergence { peak, attempts } => write!(
                f,
                "Peak {peak} did not converge after {attempts} Newton-Raphson attempts"
            ),
            Self::DuplicateParameter { parameter } => write!(
                f,
                "Parameter '{parameter}' was set multiple times. Each parameter can only be configured once."
            ),
        }
    }
}

// ============================================================================
// Standard Error Trait
// ============================================================================

impl Error for FieldError {}
