//! Error types for the matrix and factorization layers.
//!
//! Caller errors (bad indices, incompatible shapes, writes outside a storage
//! kind's structure) are reported through [`MatrixError`]. Numerical
//! conditions such as a non positive-definite input are not errors; they are
//! reported as a [`FactorStatus`](crate::factor::FactorStatus).

use thiserror::Error;

use crate::matrix::MatrixType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Caller/programmer errors.
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Index outside the logical shape of the matrix
    #[error("index ({row}, {col}) out of range for a {rows}x{cols} matrix")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Argument violates the structure of the storage kind or the operation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operand shapes are incompatible
    #[error("dimension mismatch in {op}: {lhs:?} vs {rhs:?}")]
    DimensionMismatch {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },

    /// Reshape target does not preserve the element count
    #[error("cannot reshape {rows}x{cols} into {new_rows}x{new_cols}")]
    ReshapeSize {
        rows: usize,
        cols: usize,
        new_rows: usize,
        new_cols: usize,
    },

    /// Operation is not available for this storage kind
    #[error("{op} is not supported for {kind:?} matrices")]
    UnsupportedKind { op: &'static str, kind: MatrixType },

    /// Write attempted through a read-only shallow view
    #[error("matrix is a read-only view")]
    ReadOnlyView,

    /// Malformed sparse triplet input
    #[error("sparse file, line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// `solve` called on a solver without a successful factorization
    #[error("solver has not been factorized")]
    NotFactorized,

    /// `factorize` called a second time on the same solver
    #[error("solver is already factorized")]
    AlreadyFactorized,
}

impl MatrixError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MatrixError::InvalidArgument(msg.into())
    }

    pub(crate) fn mismatch(op: &'static str, lhs: (usize, usize), rhs: (usize, usize)) -> Self {
        MatrixError::DimensionMismatch { op, lhs, rhs }
    }

    /// True for the `invalid_argument` class (structure, shape and view errors).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            MatrixError::InvalidArgument(_)
                | MatrixError::DimensionMismatch { .. }
                | MatrixError::ReadOnlyView
        )
    }
}
