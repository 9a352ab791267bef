//! The matrix value type.
//!
//! A [`Matrix`] couples a logical shape with one of five storage encodings
//! ([`MatrixType`]). Transposition is a flag: the stored values never move,
//! every index-based accessor remaps `(i, j)` instead.
//!
//! Dense matrices may borrow their values from another matrix (a shallow
//! view). The lifetime parameter ties such a view to its parent; owned
//! matrices can be used at any lifetime and are usually `Matrix<'static>`.

mod kind;
mod ops;
pub mod sparse;
mod storage;
mod views;

use std::fmt;

use log::debug;

use crate::error::{MatrixError, Result};

pub use kind::{packed_index, packed_len, MatrixType, SparseSymmetry};
pub(crate) use sparse::SparseStorage;
pub(crate) use storage::{columns_mut, Buffer, Data};

/// A matrix in one of five storage kinds.
#[derive(Debug)]
pub struct Matrix<'a> {
    /// Physical (stored) row count
    rows: usize,
    /// Physical (stored) column count
    cols: usize,
    transposed: bool,
    pub(crate) data: Data<'a>,
}

/// Read-only strided access to dense values in logical coordinates.
#[derive(Clone, Copy)]
pub(crate) struct DenseRef<'s> {
    pub(crate) data: &'s [f64],
    pub(crate) ld: usize,
    pub(crate) transposed: bool,
}

impl DenseRef<'_> {
    #[inline]
    pub(crate) fn at(&self, i: usize, j: usize) -> f64 {
        if self.transposed {
            self.data[j + i * self.ld]
        } else {
            self.data[i + j * self.ld]
        }
    }
}

impl<'a> Matrix<'a> {
    pub(crate) fn from_parts(rows: usize, cols: usize, transposed: bool, data: Data<'a>) -> Self {
        Self {
            rows,
            cols,
            transposed,
            data,
        }
    }

    /// Zero matrix of the given kind. Diagonal, Symmetric and LowerTriangular
    /// must be square; Sparse starts empty and unsymmetric.
    pub fn zeros(rows: usize, cols: usize, kind: MatrixType) -> Result<Self> {
        if kind.requires_square() && rows != cols {
            return Err(MatrixError::invalid(format!(
                "{:?} matrix must be square, got {}x{}",
                kind, rows, cols
            )));
        }
        let data = match kind {
            MatrixType::Dense => Data::Dense {
                buf: Buffer::Owned(vec![0.0; rows * cols]),
                ld: rows.max(1),
            },
            MatrixType::Sparse => {
                Data::Sparse(SparseStorage::new(rows, cols, 0, SparseSymmetry::Unsymmetric))
            }
            MatrixType::Diagonal => Data::Diagonal(vec![0.0; rows]),
            MatrixType::Symmetric => Data::Symmetric(vec![0.0; packed_len(rows)]),
            MatrixType::LowerTriangular => Data::Lower(vec![0.0; packed_len(rows)]),
        };
        Ok(Self::from_parts(rows, cols, false, data))
    }

    /// Dense zero matrix.
    pub fn dense(rows: usize, cols: usize) -> Self {
        Self::from_parts(
            rows,
            cols,
            false,
            Data::Dense {
                buf: Buffer::Owned(vec![0.0; rows * cols]),
                ld: rows.max(1),
            },
        )
    }

    /// Dense matrix taking ownership of column-major `values`.
    pub fn from_column_major(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(MatrixError::invalid(format!(
                "{} values cannot fill a {}x{} matrix",
                values.len(),
                rows,
                cols
            )));
        }
        Ok(Self::from_parts(
            rows,
            cols,
            false,
            Data::Dense {
                buf: Buffer::Owned(values),
                ld: rows.max(1),
            },
        ))
    }

    /// Dense column vector.
    pub fn column(values: Vec<f64>) -> Self {
        let n = values.len();
        Self::from_parts(
            n,
            1,
            false,
            Data::Dense {
                buf: Buffer::Owned(values),
                ld: n.max(1),
            },
        )
    }

    /// Diagonal matrix with the given diagonal.
    pub fn diagonal(values: Vec<f64>) -> Self {
        let n = values.len();
        Self::from_parts(n, n, false, Data::Diagonal(values))
    }

    /// Symmetric or LowerTriangular matrix from column-major packed lower values.
    pub fn from_packed(n: usize, kind: MatrixType, values: Vec<f64>) -> Result<Self> {
        if values.len() != packed_len(n) {
            return Err(MatrixError::invalid(format!(
                "packed {}x{} storage needs {} values, got {}",
                n,
                n,
                packed_len(n),
                values.len()
            )));
        }
        let data = match kind {
            MatrixType::Symmetric => Data::Symmetric(values),
            MatrixType::LowerTriangular => Data::Lower(values),
            other => {
                return Err(MatrixError::UnsupportedKind {
                    op: "from_packed",
                    kind: other,
                })
            }
        };
        Ok(Self::from_parts(n, n, false, data))
    }

    /// Empty sparse matrix with a capacity hint of `max_nnz` entries.
    pub fn sparse(rows: usize, cols: usize, max_nnz: usize, symmetry: SparseSymmetry) -> Self {
        Self::from_parts(
            rows,
            cols,
            false,
            Data::Sparse(SparseStorage::new(rows, cols, max_nnz, symmetry)),
        )
    }

    /// Sparse matrix from `(row, col, value)` triplets. Duplicate coordinates
    /// are summed; symmetric-lower input must satisfy `row >= col`.
    pub fn sparse_from_triplets<I>(
        rows: usize,
        cols: usize,
        triplets: I,
        symmetry: SparseSymmetry,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        if symmetry == SparseSymmetry::SymmetricLower && rows != cols {
            return Err(MatrixError::invalid(format!(
                "symmetric sparse matrix must be square, got {}x{}",
                rows, cols
            )));
        }
        let mut checked = Vec::new();
        for (i, j, v) in triplets {
            if i >= rows || j >= cols {
                return Err(MatrixError::OutOfRange {
                    row: i,
                    col: j,
                    rows,
                    cols,
                });
            }
            if symmetry == SparseSymmetry::SymmetricLower && i < j {
                return Err(MatrixError::invalid(format!(
                    "symmetric-lower storage cannot hold upper entry ({}, {})",
                    i, j
                )));
            }
            checked.push((i, j, v));
        }
        let csc = sparse::from_triplets(rows, cols, checked);
        Ok(Self::from_parts(
            rows,
            cols,
            false,
            Data::Sparse(SparseStorage::from_csc(csc, symmetry)),
        ))
    }

    /// Rebind an owned result to this matrix's lifetime.
    pub(crate) fn rebind<'b>(m: Matrix<'b>) -> Matrix<'a>
    where
        'b: 'a,
    {
        let data = match m.data {
            Data::Dense { buf, ld } => {
                let buf = match buf {
                    Buffer::Owned(v) => Buffer::Owned(v),
                    Buffer::Shared(s) => Buffer::Shared(s),
                    Buffer::Exclusive(s) => Buffer::Exclusive(s),
                };
                Data::Dense { buf, ld }
            }
            Data::Sparse(s) => Data::Sparse(s),
            Data::Diagonal(d) => Data::Diagonal(d),
            Data::Symmetric(p) => Data::Symmetric(p),
            Data::Lower(p) => Data::Lower(p),
        };
        Matrix::from_parts(m.rows, m.cols, m.transposed, data)
    }

    /// Logical row count.
    #[inline]
    pub fn rows(&self) -> usize {
        if self.transposed {
            self.cols
        } else {
            self.rows
        }
    }

    /// Logical column count.
    #[inline]
    pub fn cols(&self) -> usize {
        if self.transposed {
            self.rows
        } else {
            self.cols
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub(crate) fn physical_shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn kind(&self) -> MatrixType {
        match &self.data {
            Data::Dense { .. } => MatrixType::Dense,
            Data::Sparse(_) => MatrixType::Sparse,
            Data::Diagonal(_) => MatrixType::Diagonal,
            Data::Symmetric(_) => MatrixType::Symmetric,
            Data::Lower(_) => MatrixType::LowerTriangular,
        }
    }

    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    /// Number of stored values: `n` for Diagonal, `n(n+1)/2` for packed kinds,
    /// the occupancy for Sparse and `rows * cols` for Dense.
    pub fn length(&self) -> usize {
        match &self.data {
            Data::Dense { .. } => self.rows * self.cols,
            Data::Sparse(s) => s.nnz(),
            Data::Diagonal(d) => d.len(),
            Data::Symmetric(p) | Data::Lower(p) => p.len(),
        }
    }

    /// Stored entry count; mirrored symmetric entries count once.
    pub fn nnz(&self) -> usize {
        self.length()
    }

    /// Declared sparse capacity; `length()` for the other kinds.
    pub fn max_nnz(&self) -> usize {
        match &self.data {
            Data::Sparse(s) => s.max_nnz,
            _ => self.length(),
        }
    }

    pub fn symmetry(&self) -> Option<SparseSymmetry> {
        match &self.data {
            Data::Sparse(s) => Some(s.symmetry),
            _ => None,
        }
    }

    pub fn is_column_vector(&self) -> bool {
        self.cols() == 1
    }

    pub fn is_vector(&self) -> bool {
        self.rows() == 1 || self.cols() == 1
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// True when the values are borrowed from another buffer.
    pub fn is_view(&self) -> bool {
        match &self.data {
            Data::Dense { buf, .. } => buf.is_view(),
            _ => false,
        }
    }

    #[inline]
    fn physical(&self, i: usize, j: usize) -> (usize, usize) {
        if self.transposed {
            (j, i)
        } else {
            (i, j)
        }
    }

    fn check_bounds(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.rows() || j >= self.cols() {
            return Err(MatrixError::OutOfRange {
                row: i,
                col: j,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    pub(crate) fn dense_ref(&self) -> Option<DenseRef<'_>> {
        match &self.data {
            Data::Dense { buf, ld } => Some(DenseRef {
                data: buf.as_slice(),
                ld: *ld,
                transposed: self.transposed,
            }),
            _ => None,
        }
    }

    /// Logical `(i, j)` without bounds checking against the logical shape.
    #[inline]
    pub(crate) fn at(&self, i: usize, j: usize) -> f64 {
        match &self.data {
            Data::Dense { buf, ld } => {
                let (pi, pj) = self.physical(i, j);
                buf.as_slice()[pi + pj * ld]
            }
            Data::Sparse(s) => {
                let (pi, pj) = self.physical(i, j);
                s.get(pi, pj)
            }
            Data::Diagonal(d) => {
                if i == j {
                    d[i]
                } else {
                    0.0
                }
            }
            Data::Symmetric(p) => {
                let (r, c) = if i >= j { (i, j) } else { (j, i) };
                p[packed_index(self.rows, r, c)]
            }
            Data::Lower(p) => {
                let (pi, pj) = self.physical(i, j);
                if pi >= pj {
                    p[packed_index(self.rows, pi, pj)]
                } else {
                    0.0
                }
            }
        }
    }

    /// Value at logical `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Result<f64> {
        self.check_bounds(i, j)?;
        Ok(self.at(i, j))
    }

    /// Write `v` at logical `(i, j)`.
    ///
    /// Fails with `InvalidArgument` outside the kind's writable structure:
    /// off-diagonal for Diagonal, `i < j` for Symmetric and symmetric-lower
    /// Sparse, above the stored triangle for LowerTriangular.
    pub fn set(&mut self, i: usize, j: usize, v: f64) -> Result<()> {
        self.check_bounds(i, j)?;
        let (pi, pj) = self.physical(i, j);
        let n = self.rows;
        match &mut self.data {
            Data::Dense { buf, ld } => {
                let ld = *ld;
                buf.as_mut_slice()?[pi + pj * ld] = v;
            }
            Data::Sparse(s) => {
                if s.symmetry == SparseSymmetry::SymmetricLower {
                    if i < j {
                        return Err(MatrixError::invalid(format!(
                            "symmetric sparse matrix stores only i >= j, got ({}, {})",
                            i, j
                        )));
                    }
                    s.set(i, j, v);
                } else {
                    s.set(pi, pj, v);
                }
            }
            Data::Diagonal(d) => {
                if i != j {
                    return Err(MatrixError::invalid(format!(
                        "cannot write off-diagonal ({}, {}) of a diagonal matrix",
                        i, j
                    )));
                }
                d[i] = v;
            }
            Data::Symmetric(p) => {
                if i < j {
                    return Err(MatrixError::invalid(format!(
                        "symmetric matrix stores only i >= j, got ({}, {})",
                        i, j
                    )));
                }
                p[packed_index(n, i, j)] = v;
            }
            Data::Lower(p) => {
                if pi < pj {
                    return Err(MatrixError::invalid(format!(
                        "({}, {}) lies outside the stored triangle",
                        i, j
                    )));
                }
                p[packed_index(n, pi, pj)] = v;
            }
        }
        Ok(())
    }

    /// Toggle the transpose flag. O(1); no values move.
    pub fn transpose(&mut self) {
        self.transposed = !self.transposed;
    }

    /// Consume and return the transposed matrix.
    pub fn transposed(mut self) -> Self {
        self.transpose();
        self
    }

    /// Reinterpret a Dense matrix as `rows x cols`.
    ///
    /// Fails with `UnsupportedKind` for non-dense kinds and `ReshapeSize` when
    /// the element count changes. The matrix is untouched on failure.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<()> {
        let kind = self.kind();
        if kind != MatrixType::Dense {
            return Err(MatrixError::UnsupportedKind { op: "reshape", kind });
        }
        if rows * cols != self.length() {
            return Err(MatrixError::ReshapeSize {
                rows: self.rows(),
                cols: self.cols(),
                new_rows: rows,
                new_cols: cols,
            });
        }

        let vector_like = self.rows == 1 || self.cols == 1;
        let relaid = if self.transposed && !vector_like {
            if self.is_view() {
                return Err(MatrixError::invalid("cannot reshape a transposed view"));
            }
            Some(self.to_vec())
        } else {
            None
        };

        let (prows, pcols) = (self.rows, self.cols);
        let Data::Dense { buf, ld } = &mut self.data else {
            return Err(MatrixError::UnsupportedKind { op: "reshape", kind });
        };
        let contiguous = *ld == prows || pcols <= 1;
        if !contiguous {
            return Err(MatrixError::invalid("cannot reshape a strided submatrix view"));
        }
        if let Some(values) = relaid {
            *buf = Buffer::Owned(values);
        }
        *ld = rows.max(1);
        self.rows = rows;
        self.cols = cols;
        self.transposed = false;
        Ok(())
    }

    /// Visit every structurally stored entry in logical coordinates. Mirrored
    /// symmetric entries are visited on both sides.
    pub(crate) fn for_each_stored(&self, mut f: impl FnMut(usize, usize, f64)) {
        let t = self.transposed;
        let mut emit = |i: usize, j: usize, v: f64| {
            if t {
                f(j, i, v)
            } else {
                f(i, j, v)
            }
        };
        match &self.data {
            Data::Dense { buf, ld } => {
                let s = buf.as_slice();
                for j in 0..self.cols {
                    for i in 0..self.rows {
                        emit(i, j, s[i + j * ld]);
                    }
                }
            }
            Data::Sparse(s) => s.for_each(&mut emit),
            Data::Diagonal(d) => {
                for (i, &v) in d.iter().enumerate() {
                    emit(i, i, v);
                }
            }
            Data::Symmetric(p) => {
                let mut k = 0;
                for j in 0..self.cols {
                    for i in j..self.rows {
                        emit(i, j, p[k]);
                        if i != j {
                            emit(j, i, p[k]);
                        }
                        k += 1;
                    }
                }
            }
            Data::Lower(p) => {
                let mut k = 0;
                for j in 0..self.cols {
                    for i in j..self.rows {
                        emit(i, j, p[k]);
                        k += 1;
                    }
                }
            }
        }
    }

    /// Logical values in column-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        let (m, n) = self.shape();
        match self.kind() {
            MatrixType::Dense => {
                let mut out = Vec::with_capacity(m * n);
                for j in 0..n {
                    for i in 0..m {
                        out.push(self.at(i, j));
                    }
                }
                out
            }
            _ => {
                let mut out = vec![0.0; m * n];
                self.for_each_stored(|i, j, v| out[i + j * m] = v);
                out
            }
        }
    }

    /// Explicit dense expansion of the logical matrix.
    pub fn to_dense(&self) -> Matrix<'static> {
        let (m, n) = self.shape();
        Matrix::from_parts(
            m,
            n,
            false,
            Data::Dense {
                buf: Buffer::Owned(self.to_vec()),
                ld: m.max(1),
            },
        )
    }

    /// Frobenius norm.
    pub fn norm_fro(&self) -> f64 {
        let mut sum = 0.0;
        self.for_each_stored(|_, _, v| sum += v * v);
        sum.sqrt()
    }

    /// Inner product of two dense vectors of equal length.
    pub fn dot(&self, other: &Matrix<'_>) -> Result<f64> {
        if !self.is_vector() || !other.is_vector() {
            return Err(MatrixError::invalid("dot requires vector operands"));
        }
        if self.kind() != MatrixType::Dense || other.kind() != MatrixType::Dense {
            return Err(MatrixError::invalid("dot requires dense vectors"));
        }
        let n = self.rows() * self.cols();
        if n != other.rows() * other.cols() {
            return Err(MatrixError::mismatch("dot", self.shape(), other.shape()));
        }
        let a = self.to_vec();
        let b = other.to_vec();
        Ok(a.iter().zip(&b).map(|(x, y)| x * y).sum())
    }

    /// Replace negative entries by zero, keeping the storage structure.
    pub fn plusop(&mut self) -> Result<()> {
        let (prows, pcols) = (self.rows, self.cols);
        match &mut self.data {
            Data::Dense { buf, ld } => {
                for col in columns_mut(buf.as_mut_slice()?, *ld, prows, pcols) {
                    for v in col {
                        *v = v.max(0.0);
                    }
                }
            }
            Data::Sparse(s) => s.clip_nonnegative(),
            Data::Diagonal(v) | Data::Symmetric(v) | Data::Lower(v) => {
                for x in v.iter_mut() {
                    *x = x.max(0.0);
                }
            }
        }
        Ok(())
    }

    /// Write the projection of `self` onto the non-negative orthant into `out`.
    ///
    /// A dense `out` (owned or writable view) receives the values in place;
    /// any other `out` must share this matrix's kind and is replaced.
    pub fn plusop_into(&self, out: &mut Matrix<'_>) -> Result<()> {
        if out.shape() != self.shape() {
            return Err(MatrixError::mismatch("plusop", self.shape(), out.shape()));
        }
        if out.kind() == MatrixType::Dense {
            let (m, n) = self.shape();
            if out.is_view() {
                // surface read-only views before writing anything
                out.dense_mut()?;
            }
            for j in 0..n {
                for i in 0..m {
                    out.set(i, j, self.at(i, j).max(0.0))?;
                }
            }
            return Ok(());
        }
        if out.kind() != self.kind() {
            return Err(MatrixError::invalid(format!(
                "plusop cannot write a {:?} matrix into {:?} storage",
                self.kind(),
                out.kind()
            )));
        }
        let mut projected = self.deep_copy();
        projected.plusop()?;
        *out = Matrix::rebind(projected);
        Ok(())
    }

    /// Convert Diagonal to the dense column of its diagonal, or a dense
    /// column vector to the Diagonal matrix it describes.
    pub fn toggle_diagonal(&mut self) -> Result<()> {
        let is_column = self.cols() == 1;
        match &mut self.data {
            Data::Diagonal(d) => {
                let d = std::mem::take(d);
                *self = Matrix::column(d);
            }
            Data::Dense { .. } if is_column => {
                let values = self.to_vec();
                *self = Matrix::diagonal(values);
            }
            _ => {
                let kind = self.kind();
                return Err(MatrixError::invalid(format!(
                    "toggle_diagonal needs a Diagonal matrix or a dense column vector, got {:?} {}x{}",
                    kind,
                    self.rows(),
                    self.cols()
                )));
            }
        }
        Ok(())
    }

    /// Independent owned copy (dense windows are compacted).
    pub fn deep_copy(&self) -> Matrix<'static> {
        Matrix::from_parts(
            self.rows,
            self.cols,
            self.transposed,
            self.data.to_owned_data(self.rows, self.cols),
        )
    }

    /// Mutable dense values and leading dimension.
    pub(crate) fn dense_mut(&mut self) -> Result<(&mut [f64], usize)> {
        match &mut self.data {
            Data::Dense { buf, ld } => {
                let ld = *ld;
                Ok((buf.as_mut_slice()?, ld))
            }
            _ => Err(MatrixError::invalid("expected dense storage")),
        }
    }

    /// Scale every stored value by `alpha`.
    pub fn scale(&mut self, alpha: f64) -> Result<()> {
        let (prows, pcols) = (self.rows, self.cols);
        match &mut self.data {
            Data::Dense { buf, ld } => {
                for col in columns_mut(buf.as_mut_slice()?, *ld, prows, pcols) {
                    for v in col {
                        *v *= alpha;
                    }
                }
            }
            Data::Sparse(s) => {
                for v in s.csc.data_mut() {
                    *v *= alpha;
                }
            }
            Data::Diagonal(v) | Data::Symmetric(v) | Data::Lower(v) => {
                for x in v.iter_mut() {
                    *x *= alpha;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn log_shape(&self, what: &str) {
        debug!(
            "{}: {:?} {}x{}{}",
            what,
            self.kind(),
            self.rows(),
            self.cols(),
            if self.transposed { " (transposed)" } else { "" }
        );
    }
}

impl Clone for Matrix<'_> {
    /// Deep copy: the clone owns an independent buffer, even for views.
    fn clone(&self) -> Self {
        Matrix::rebind(self.deep_copy())
    }
}

impl PartialEq for Matrix<'_> {
    fn eq(&self, other: &Self) -> bool {
        if self.shape() != other.shape() || self.kind() != other.kind() {
            return false;
        }
        let (m, n) = self.shape();
        (0..n).all(|j| (0..m).all(|i| self.at(i, j) == other.at(i, j)))
    }
}

impl fmt::Display for Matrix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (m, n) = self.shape();
        writeln!(f, "{:?} {}x{}", self.kind(), m, n)?;
        for i in 0..m {
            for j in 0..n {
                write!(f, "{:>12.5}", self.at(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
