//! Sparse storage in CSC (Compressed Sparse Column) format.
//!
//! Values live in a `sprs` CSC matrix. The declared `max_nnz` is a capacity
//! hint: inserting past it grows the structure. Symmetric-lower storage keeps
//! only entries with `row >= col` and mirrors them on read.

use log::debug;
use sprs::{CsMat, TriMat};

use super::kind::SparseSymmetry;

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Triplet format sparse matrix builder.
pub type SparseTriMat = TriMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value). Duplicates are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Empty CSC matrix with room for `capacity` entries.
pub fn empty_csc(nrows: usize, ncols: usize, capacity: usize) -> SparseCsc {
    CsMat::new_csc(
        (nrows, ncols),
        vec![0; ncols + 1],
        Vec::with_capacity(capacity),
        Vec::with_capacity(capacity),
    )
}

#[derive(Debug, Clone)]
pub(crate) struct SparseStorage {
    pub(crate) csc: SparseCsc,
    pub(crate) max_nnz: usize,
    pub(crate) symmetry: SparseSymmetry,
}

impl SparseStorage {
    pub(crate) fn new(rows: usize, cols: usize, max_nnz: usize, symmetry: SparseSymmetry) -> Self {
        Self {
            csc: empty_csc(rows, cols, max_nnz),
            max_nnz,
            symmetry,
        }
    }

    pub(crate) fn from_csc(csc: SparseCsc, symmetry: SparseSymmetry) -> Self {
        let max_nnz = csc.nnz();
        Self {
            csc,
            max_nnz,
            symmetry,
        }
    }

    #[inline]
    pub(crate) fn nnz(&self) -> usize {
        self.csc.nnz()
    }

    /// Value at physical `(i, j)`, mirroring for symmetric-lower storage.
    pub(crate) fn get(&self, i: usize, j: usize) -> f64 {
        let (i, j) = match self.symmetry {
            SparseSymmetry::SymmetricLower if i < j => (j, i),
            _ => (i, j),
        };
        self.csc.get(i, j).copied().unwrap_or(0.0)
    }

    /// Store `v` at physical `(i, j)`, replacing any existing value.
    pub(crate) fn set(&mut self, i: usize, j: usize, v: f64) {
        let present = self.csc.get(i, j).is_some();
        if !present && self.csc.nnz() >= self.max_nnz {
            debug!(
                "sparse {}x{}: growing past declared capacity {} at ({}, {})",
                self.csc.rows(),
                self.csc.cols(),
                self.max_nnz,
                i,
                j
            );
        }
        self.csc.insert(i, j, v);
    }

    /// Visit every represented entry in physical coordinates, both halves for
    /// symmetric-lower storage.
    pub(crate) fn for_each(&self, mut f: impl FnMut(usize, usize, f64)) {
        let mirror = self.symmetry == SparseSymmetry::SymmetricLower;
        for (&v, (i, j)) in self.csc.iter() {
            f(i, j, v);
            if mirror && i != j {
                f(j, i, v);
            }
        }
    }

    /// Transposed lower triangle in CSC form (the upper triangle of the
    /// symmetric matrix it describes), every diagonal entry present
    /// (explicit zero when absent). Entries above the diagonal are ignored.
    pub(crate) fn upper_triangle_with_diagonal(&self) -> SparseCsc {
        let n = self.csc.cols();
        let mut tri = TriMat::new((n, n));
        let mut has_diag = vec![false; n];
        for (&v, (i, j)) in self.csc.iter() {
            if i < j {
                continue;
            }
            if i == j {
                has_diag[i] = true;
            }
            tri.add_triplet(j, i, v);
        }
        for (k, present) in has_diag.iter().enumerate() {
            if !present {
                tri.add_triplet(k, k, 0.0);
            }
        }
        tri.to_csc()
    }

    /// y = alpha * op(A) * x + beta * y, where op(A) is A or A^T.
    pub(crate) fn spmv(&self, transpose: bool, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
        if beta == 0.0 {
            y.fill(0.0);
        } else if beta != 1.0 {
            for yi in y.iter_mut() {
                *yi *= beta;
            }
        }
        if alpha == 0.0 {
            return;
        }
        self.for_each(|i, j, v| {
            if transpose {
                y[j] += alpha * v * x[i];
            } else {
                y[i] += alpha * v * x[j];
            }
        });
    }

    pub(crate) fn clip_nonnegative(&mut self) {
        for v in self.csc.data_mut() {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
    }
}
