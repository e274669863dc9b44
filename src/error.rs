//! Error types for calibration, triangulation and interpolation.

use thiserror::Error;

use crate::point::Point;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, InterpolationError>;

/// Errors raised while building or querying an interpolation model.
///
/// Points lying outside the convex hull are not errors; they are reported
/// through [`crate::InterpolationResult::OutsideHull`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    /// Two calibration samples share the same control point.
    #[error("duplicate calibration sample at {point}: sample #{index} repeats sample #{first}")]
    DuplicateSample {
        point: Point,
        first: usize,
        index: usize,
    },

    /// The samples cannot span a full-dimensional simplex.
    #[error("degenerate calibration set: {reason}")]
    DegenerateInput { reason: String },

    /// The barycentric system of a simplex could not be solved.
    #[error("singular simplex {vertices:?} while solving weights for {query}")]
    SingularSimplex { vertices: Vec<usize>, query: Point },

    /// A point or table does not have the expected number of coordinates.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: &'static str,
    },

    /// A sample's output vector has a different length than the others.
    #[error("value length mismatch for sample #{index}: expected {expected}, got {actual}")]
    ValueLengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("non-finite value in {context}")]
    NonFiniteValue { context: String },

    #[error("unsupported control-space dimension {0} (expected 2 or 3)")]
    UnsupportedDimension(usize),

    #[error("sample store is empty")]
    EmptyStore,

    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("failed to start worker pool: {reason}")]
    WorkerPool { reason: String },

    /// The batch was stopped through its cancellation flag.
    #[error("batch cancelled after {completed} of {total} chunks")]
    Cancelled { completed: usize, total: usize },
}
