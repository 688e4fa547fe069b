//! Error types for the cut-data index.

use thiserror::Error;

/// Errors from building an index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// At least two rows are needed to form a path segment.
    #[error("need at least 2 rows to build a path, got {0}")]
    TooFewRows(usize),

    /// A row has a NaN or infinite position.
    #[error("row {0} has a non-finite position")]
    NonFinitePosition(usize),

    /// The match threshold is negative or NaN.
    #[error("invalid match threshold {0}")]
    InvalidThreshold(f64),

    /// The table does not have the expected columns.
    #[error("table has {found} columns, expected {expected}")]
    ColumnMismatch {
        /// Columns required.
        expected: usize,
        /// Columns present.
        found: usize,
    },
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
