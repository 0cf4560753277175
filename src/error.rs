//! Error types for blockqr operations.
//!
//! Shape and bounds problems are reported through [`BlockQrError`] so callers
//! can decide how to react. Local indices that fall outside an already
//! validated view are programming errors and panic instead.

use std::fmt;

/// Errors that can occur while building views or factoring a block matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockQrError {
    /// A submatrix view does not fit inside its backing matrix.
    InvalidBounds {
        /// First row of the requested view.
        row0: usize,
        /// One past the last row of the requested view.
        row1: usize,
        /// First column of the requested view.
        col0: usize,
        /// One past the last column of the requested view.
        col1: usize,
        /// Number of rows in the backing matrix.
        rows: usize,
        /// Number of columns in the backing matrix.
        cols: usize,
    },
    /// Two operands disagree on a dimension.
    DimensionMismatch {
        /// The size the operation needed.
        expected: usize,
        /// The size that was supplied.
        found: usize,
        /// Human-readable error message.
        message: String,
    },
    /// Input validation error.
    ValidationError {
        /// Human-readable error message.
        message: String,
    },
}

impl fmt::Display for BlockQrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockQrError::InvalidBounds {
                row0,
                row1,
                col0,
                col1,
                rows,
                cols,
            } => write!(
                f,
                "Invalid submatrix bounds: rows {}..{}, cols {}..{} do not fit a {}x{} matrix",
                row0, row1, col0, col1, rows, cols
            ),
            BlockQrError::DimensionMismatch {
                expected,
                found,
                message,
            } => write!(
                f,
                "Dimension mismatch: {} (expected {}, found {})",
                message, expected, found
            ),
            BlockQrError::ValidationError { message } => {
                write!(f, "Validation error: {}", message)
            }
        }
    }
}

impl std::error::Error for BlockQrError {}

/// Result type alias for blockqr operations.
pub type Result<T> = std::result::Result<T, BlockQrError>;

/// Creates an invalid-bounds error.
pub fn bounds_error(
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
    rows: usize,
    cols: usize,
) -> BlockQrError {
    BlockQrError::InvalidBounds {
        row0,
        row1,
        col0,
        col1,
        rows,
        cols,
    }
}

/// Creates a dimension mismatch error.
pub fn dimension_error(expected: usize, found: usize, message: impl Into<String>) -> BlockQrError {
    BlockQrError::DimensionMismatch {
        expected,
        found,
        message: message.into(),
    }
}

/// Creates a validation error.
pub fn validation_error(message: impl Into<String>) -> BlockQrError {
    BlockQrError::ValidationError {
        message: message.into(),
    }
}
