//! Storage kinds and the memory layouts they imply.
//!
//! | Kind | Stored values | Layout |
//! |---|---|---|
//! | `Dense` | `rows * cols` | column-major, leading dimension `ld >= rows` |
//! | `Sparse` | `nnz <= max_nnz` (soft) | CSC |
//! | `Diagonal` | `n` | `d[i] = A[i, i]` |
//! | `Symmetric` | `n(n+1)/2` | column-major packed lower triangle |
//! | `LowerTriangular` | `n(n+1)/2` | column-major packed lower triangle |

/// Storage encoding of a [`Matrix`](super::Matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixType {
    Dense,
    Sparse,
    Diagonal,
    Symmetric,
    LowerTriangular,
}

impl MatrixType {
    pub const ALL: [MatrixType; 5] = [
        MatrixType::Dense,
        MatrixType::Sparse,
        MatrixType::Diagonal,
        MatrixType::Symmetric,
        MatrixType::LowerTriangular,
    ];

    /// Kinds that only exist as square matrices.
    pub fn requires_square(self) -> bool {
        matches!(
            self,
            MatrixType::Diagonal | MatrixType::Symmetric | MatrixType::LowerTriangular
        )
    }

    /// Kinds stored as a packed lower triangle.
    pub fn is_packed(self) -> bool {
        matches!(self, MatrixType::Symmetric | MatrixType::LowerTriangular)
    }
}

/// Sparse storage variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SparseSymmetry {
    /// All entries stored explicitly
    #[default]
    Unsymmetric,
    /// Only entries with `i >= j` are stored; the upper side mirrors them
    SymmetricLower,
}

/// Number of values in a packed `n x n` lower triangle.
#[inline]
pub fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Position of `(i, j)`, `i >= j`, in a column-major packed lower triangle.
#[inline]
pub fn packed_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i >= j && i < n);
    i + j * (2 * n - j - 1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_index_is_dense_enumeration() {
        let n = 5;
        let mut expected = 0;
        for j in 0..n {
            for i in j..n {
                assert_eq!(packed_index(n, i, j), expected);
                expected += 1;
            }
        }
        assert_eq!(expected, packed_len(n));
    }

    #[test]
    fn test_square_kinds() {
        assert!(!MatrixType::Dense.requires_square());
        assert!(!MatrixType::Sparse.requires_square());
        assert!(MatrixType::Diagonal.requires_square());
        assert!(MatrixType::Symmetric.is_packed());
        assert!(!MatrixType::Diagonal.is_packed());
    }
}
