//! Kind resolution and algorithms for binary matrix operations.
//!
//! The result kind of every binary operation comes from the two tables below,
//! indexed by `(lhs kind, rhs kind)` in [`MatrixType::ALL`] order:
//!
//! ```text
//! ADD        Dense   Sparse  Diag    Sym     Lower
//! Dense      Dense   Dense   Dense   Dense   Dense
//! Sparse     Dense   Sparse  Sparse  Dense   Sparse
//! Diag       Dense   Sparse  Diag    Sym     Lower
//! Sym        Dense   Dense   Sym     Sym     Dense
//! Lower      Dense   Sparse  Lower   Dense   Dense
//!
//! MULTIPLY   Dense   Sparse  Diag    Sym     Lower
//! Dense      Dense   Dense   Dense   Dense   Dense
//! Sparse     Sparse  Sparse  Sparse  Sparse  Sparse
//! Diag       Dense   Sparse  Diag    Dense   Lower
//! Sym        Dense   Dense   Dense   Dense   Dense
//! Lower      Dense   Sparse  Lower   Dense   Lower*
//! ```
//!
//! `*` a Lower x Lower product stays triangular only when both operands carry
//! the same transpose flag; otherwise it is Dense.
//!
//! Transpose flags are honored by remapping indices. A LowerTriangular result
//! whose triangular operand is transposed is stored as a packed lower
//! triangle with the transpose flag set.

use log::trace;

use crate::error::{MatrixError, Result};
use crate::matrix::sparse::{self, SparseCsc};
use crate::matrix::{
    packed_index, packed_len, Buffer, Data, DenseRef, Matrix, MatrixType, SparseStorage,
    SparseSymmetry,
};

use crate::matrix::MatrixType::{
    Dense as De, Diagonal as Dg, LowerTriangular as Lo, Sparse as Sp, Symmetric as Sy,
};

const ADD_TABLE: [[MatrixType; 5]; 5] = [
    [De, De, De, De, De],
    [De, Sp, Sp, De, Sp],
    [De, Sp, Dg, Sy, Lo],
    [De, De, Sy, Sy, De],
    [De, Sp, Lo, De, De],
];

const MUL_TABLE: [[MatrixType; 5]; 5] = [
    [De, De, De, De, De],
    [Sp, Sp, Sp, Sp, Sp],
    [De, Sp, Dg, De, Lo],
    [De, De, De, De, De],
    [De, Sp, Lo, De, Lo],
];

#[inline]
fn slot(kind: MatrixType) -> usize {
    match kind {
        MatrixType::Dense => 0,
        MatrixType::Sparse => 1,
        MatrixType::Diagonal => 2,
        MatrixType::Symmetric => 3,
        MatrixType::LowerTriangular => 4,
    }
}

/// Result kind of `lhs + rhs` (and `lhs - rhs`).
pub fn add_result_kind(lhs: MatrixType, rhs: MatrixType) -> MatrixType {
    ADD_TABLE[slot(lhs)][slot(rhs)]
}

/// Result kind of `lhs * rhs` for untransposed operands.
pub fn mul_result_kind(lhs: MatrixType, rhs: MatrixType) -> MatrixType {
    MUL_TABLE[slot(lhs)][slot(rhs)]
}

/// Result kind of `a * b` taking transpose flags into account.
pub fn resolve_mul_kind(a: &Matrix<'_>, b: &Matrix<'_>) -> MatrixType {
    let kind = mul_result_kind(a.kind(), b.kind());
    if a.kind() == Lo && b.kind() == Lo && a.is_transposed() != b.is_transposed() {
        return De;
    }
    kind
}

/// Transpose flag carried by a LowerTriangular result.
fn triangular_flag(a: &Matrix<'_>, b: &Matrix<'_>) -> bool {
    if a.kind() == Lo {
        a.is_transposed()
    } else {
        b.is_transposed()
    }
}

fn diagonal_values<'m>(m: &'m Matrix<'_>) -> Option<&'m [f64]> {
    match &m.data {
        Data::Diagonal(d) => Some(d),
        _ => None,
    }
}

fn dense_matrix(rows: usize, cols: usize, values: Vec<f64>) -> Matrix<'static> {
    Matrix::from_parts(
        rows,
        cols,
        false,
        Data::Dense {
            buf: Buffer::Owned(values),
            ld: rows.max(1),
        },
    )
}

fn sparse_matrix(rows: usize, cols: usize, csc: SparseCsc, symmetry: SparseSymmetry) -> Matrix<'static> {
    Matrix::from_parts(
        rows,
        cols,
        false,
        Data::Sparse(SparseStorage::from_csc(csc, symmetry)),
    )
}

/// Packed lower values `p[(i, j)] = f(i, j)` for `i >= j`.
fn packed_from(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Vec<f64> {
    let mut p = Vec::with_capacity(packed_len(n));
    for j in 0..n {
        for i in j..n {
            p.push(f(i, j));
        }
    }
    p
}

/// Packed LowerTriangular result with logical entries `f(i, j)`.
fn triangular_result(n: usize, transposed: bool, mut f: impl FnMut(usize, usize) -> f64) -> Matrix<'static> {
    let p = packed_from(n, |i, j| if transposed { f(j, i) } else { f(i, j) });
    Matrix::from_parts(n, n, transposed, Data::Lower(p))
}

/// True when every stored entry of `m` belongs to a symmetric matrix whose
/// lower half is enough to rebuild it.
fn is_symmetric_source(m: &Matrix<'_>) -> bool {
    match m.kind() {
        MatrixType::Diagonal | MatrixType::Symmetric => true,
        MatrixType::Sparse => m.symmetry() == Some(SparseSymmetry::SymmetricLower),
        _ => false,
    }
}

/// Logical CSC image of any matrix. Exact zeros of non-sparse kinds are skipped.
fn logical_csc(m: &Matrix<'_>) -> SparseCsc {
    let keep_zeros = m.kind() == MatrixType::Sparse;
    let mut triplets = Vec::new();
    m.for_each_stored(|i, j, v| {
        if keep_zeros || v != 0.0 {
            triplets.push((i, j, v));
        }
    });
    sparse::from_triplets(m.rows(), m.cols(), triplets)
}

/// `a + beta * b`, result kind from the addition table.
pub(crate) fn combine(a: &Matrix<'_>, b: &Matrix<'_>, beta: f64) -> Result<Matrix<'static>> {
    if a.shape() != b.shape() {
        let op = if beta < 0.0 { "subtraction" } else { "addition" };
        return Err(MatrixError::mismatch(op, a.shape(), b.shape()));
    }
    let (m, n) = a.shape();
    let kind = add_result_kind(a.kind(), b.kind());
    trace!("combine {:?} + {:?} -> {:?}", a.kind(), b.kind(), kind);

    let result = match kind {
        MatrixType::Dense => {
            let mut values = a.to_vec();
            b.for_each_stored(|i, j, v| values[i + j * m] += beta * v);
            dense_matrix(m, n, values)
        }
        MatrixType::Sparse => {
            let symmetric = is_symmetric_source(a) && is_symmetric_source(b);
            let mut tri = sparse::SparseTriMat::new((m, n));
            a.for_each_stored(|i, j, v| {
                if !symmetric || i >= j {
                    tri.add_triplet(i, j, v);
                }
            });
            b.for_each_stored(|i, j, v| {
                if !symmetric || i >= j {
                    tri.add_triplet(i, j, beta * v);
                }
            });
            let symmetry = if symmetric {
                SparseSymmetry::SymmetricLower
            } else {
                SparseSymmetry::Unsymmetric
            };
            sparse_matrix(m, n, tri.to_csc(), symmetry)
        }
        MatrixType::Diagonal => {
            let (Some(da), Some(db)) = (diagonal_values(a), diagonal_values(b)) else {
                return Err(MatrixError::invalid("diagonal sum needs diagonal operands"));
            };
            Matrix::diagonal(da.iter().zip(db).map(|(x, y)| x + beta * y).collect())
        }
        MatrixType::Symmetric => {
            let p = packed_from(m, |i, j| a.at(i, j) + beta * b.at(i, j));
            Matrix::from_parts(m, n, false, Data::Symmetric(p))
        }
        MatrixType::LowerTriangular => {
            let t = triangular_flag(a, b);
            triangular_result(m, t, |i, j| a.at(i, j) + beta * b.at(i, j))
        }
    };
    Ok(result)
}

/// Dense product of two strided operands: `a` is `m x k`, `b` is `k x n`.
pub(crate) fn gemm(a: DenseRef<'_>, b: DenseRef<'_>, m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * n];
    for j in 0..n {
        let col = &mut out[j * m..(j + 1) * m];
        for p in 0..k {
            let bpj = b.at(p, j);
            if bpj == 0.0 {
                continue;
            }
            for (i, c) in col.iter_mut().enumerate() {
                *c += a.at(i, p) * bpj;
            }
        }
    }
    out
}

/// Sparse product by column accumulation: `c(:, j) = sum_k a(:, k) b(k, j)`.
fn sparse_product(a: &SparseCsc, b: &SparseCsc) -> SparseCsc {
    let (m, n) = (a.rows(), b.cols());
    let mut tri = sparse::SparseTriMat::new((m, n));
    let mut acc = vec![0.0; m];
    let mut touched = vec![false; m];
    let mut rows = Vec::new();
    for j in 0..n {
        let Some(bcol) = b.outer_view(j) else { continue };
        for (k, &bkj) in bcol.iter() {
            let Some(acol) = a.outer_view(k) else { continue };
            for (i, &aik) in acol.iter() {
                if !touched[i] {
                    touched[i] = true;
                    rows.push(i);
                }
                acc[i] += aik * bkj;
            }
        }
        rows.sort_unstable();
        for &i in &rows {
            tri.add_triplet(i, j, acc[i]);
            acc[i] = 0.0;
            touched[i] = false;
        }
        rows.clear();
    }
    tri.to_csc()
}

/// `a * b`, result kind from the multiplication table.
pub(crate) fn multiply(a: &Matrix<'_>, b: &Matrix<'_>) -> Result<Matrix<'static>> {
    if a.cols() != b.rows() {
        return Err(MatrixError::mismatch("multiplication", a.shape(), b.shape()));
    }
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let kind = resolve_mul_kind(a, b);
    trace!("multiply {:?} * {:?} -> {:?}", a.kind(), b.kind(), kind);

    let result = match kind {
        MatrixType::Dense => {
            if let (Some(da), Some(db)) = (a.dense_ref(), b.dense_ref()) {
                dense_matrix(m, n, gemm(da, db, m, k, n))
            } else {
                let mut out = vec![0.0; m * n];
                if let Some(d) = diagonal_values(b) {
                    // right-multiplying by a diagonal scales columns
                    a.for_each_stored(|i, j, v| out[i + j * m] += v * d[j]);
                } else if let Some(d) = diagonal_values(a) {
                    // left-multiplying by a diagonal scales rows
                    b.for_each_stored(|i, j, v| out[i + j * m] += d[i] * v);
                } else if b.kind() == MatrixType::Sparse {
                    b.for_each_stored(|p, j, v| {
                        for i in 0..m {
                            out[i + j * m] += a.at(i, p) * v;
                        }
                    });
                } else {
                    a.for_each_stored(|i, p, v| {
                        for j in 0..n {
                            out[i + j * m] += v * b.at(p, j);
                        }
                    });
                }
                dense_matrix(m, n, out)
            }
        }
        MatrixType::Sparse => {
            if let Some(d) = diagonal_values(b) {
                let mut tri = sparse::SparseTriMat::new((m, n));
                a.for_each_stored(|i, j, v| tri.add_triplet(i, j, v * d[j]));
                sparse_matrix(m, n, tri.to_csc(), SparseSymmetry::Unsymmetric)
            } else if let Some(d) = diagonal_values(a) {
                let mut tri = sparse::SparseTriMat::new((m, n));
                b.for_each_stored(|i, j, v| tri.add_triplet(i, j, d[i] * v));
                sparse_matrix(m, n, tri.to_csc(), SparseSymmetry::Unsymmetric)
            } else {
                let product = sparse_product(&logical_csc(a), &logical_csc(b));
                sparse_matrix(m, n, product, SparseSymmetry::Unsymmetric)
            }
        }
        MatrixType::Diagonal => {
            let (Some(da), Some(db)) = (diagonal_values(a), diagonal_values(b)) else {
                return Err(MatrixError::invalid("diagonal product needs diagonal operands"));
            };
            Matrix::diagonal(da.iter().zip(db).map(|(x, y)| x * y).collect())
        }
        MatrixType::LowerTriangular => {
            let t = triangular_flag(a, b);
            if let Some(d) = diagonal_values(a) {
                triangular_result(m, t, |i, j| d[i] * b.at(i, j))
            } else if let Some(d) = diagonal_values(b) {
                triangular_result(m, t, |i, j| a.at(i, j) * d[j])
            } else {
                triangular_result(m, t, |i, j| {
                    let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
                    (lo..=hi).map(|p| a.at(i, p) * b.at(p, j)).sum()
                })
            }
        }
        MatrixType::Symmetric => {
            return Err(MatrixError::invalid("products never resolve to packed symmetric storage"));
        }
    };
    Ok(result)
}

/// `0.5 * x' A x` without expanding `A`.
pub(crate) fn quad(a: &Matrix<'_>, x: &Matrix<'_>) -> Result<f64> {
    let xv = quad_operand(a, x)?;
    let n = xv.len();
    let sum = match &a.data {
        Data::Dense { .. } => {
            let mut s = 0.0;
            for j in 0..n {
                let mut col = 0.0;
                for (i, xi) in xv.iter().enumerate() {
                    col += a.at(i, j) * xi;
                }
                s += col * xv[j];
            }
            s
        }
        Data::Sparse(s) => {
            // x' A x == x' A' x, so physical coordinates are enough
            let mut acc = 0.0;
            s.for_each(|i, j, v| acc += v * xv[i] * xv[j]);
            acc
        }
        Data::Diagonal(d) => d.iter().zip(&xv).map(|(di, xi)| di * xi * xi).sum::<f64>(),
        Data::Symmetric(p) => {
            let mut acc = 0.0;
            for j in 0..n {
                acc += p[packed_index(n, j, j)] * xv[j] * xv[j];
                for i in j + 1..n {
                    acc += 2.0 * p[packed_index(n, i, j)] * xv[i] * xv[j];
                }
            }
            acc
        }
        Data::Lower(p) => {
            let mut acc = 0.0;
            for j in 0..n {
                for i in j..n {
                    acc += p[packed_index(n, i, j)] * xv[i] * xv[j];
                }
            }
            acc
        }
    };
    Ok(0.5 * sum)
}

/// `0.5 * x' A x + q' x`.
pub(crate) fn quad_linear(a: &Matrix<'_>, x: &Matrix<'_>, q: &Matrix<'_>) -> Result<f64> {
    let base = quad(a, x)?;
    if q.kind() != MatrixType::Dense || !q.is_vector() || q.rows() * q.cols() != x.rows() * x.cols() {
        return Err(MatrixError::mismatch("quad linear term", x.shape(), q.shape()));
    }
    Ok(base + x.dot(q)?)
}

fn quad_operand(a: &Matrix<'_>, x: &Matrix<'_>) -> Result<Vec<f64>> {
    if a.rows() != a.cols() {
        return Err(MatrixError::invalid(format!(
            "quadratic form needs a square matrix, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    if x.kind() != MatrixType::Dense || !x.is_vector() || x.rows() * x.cols() != a.rows() {
        return Err(MatrixError::mismatch("quadratic form", a.shape(), x.shape()));
    }
    Ok(x.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition_kind_is_commutative() {
        for a in MatrixType::ALL {
            for b in MatrixType::ALL {
                assert_eq!(add_result_kind(a, b), add_result_kind(b, a), "{:?} + {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_table_spot_checks() {
        assert_eq!(add_result_kind(Sp, Sy), De);
        assert_eq!(add_result_kind(Dg, Sy), Sy);
        assert_eq!(add_result_kind(Lo, Lo), De);
        assert_eq!(mul_result_kind(Sp, De), Sp);
        assert_eq!(mul_result_kind(De, Sp), De);
        assert_eq!(mul_result_kind(Dg, Dg), Dg);
        assert_eq!(mul_result_kind(Sy, Dg), De);
        assert_eq!(mul_result_kind(Lo, Sp), Sp);
    }

    #[test]
    fn test_gemm_transposed_operands() {
        // a = [[1, 3], [2, 4]] stored column-major, used as a'
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [1.0, 0.0, 0.0, 1.0];
        let ar = DenseRef { data: &a, ld: 2, transposed: true };
        let br = DenseRef { data: &b, ld: 2, transposed: false };
        assert_eq!(gemm(ar, br, 2, 2, 2), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_sparse_product_matches_dense() {
        let a = sparse::from_triplets(2, 3, vec![(0, 0, 1.0), (1, 2, 2.0), (0, 1, -1.0)]);
        let b = sparse::from_triplets(3, 2, vec![(0, 1, 4.0), (2, 0, 3.0), (1, 1, 1.0)]);
        let c = sparse_product(&a, &b);
        // [[1, -1, 0], [0, 0, 2]] * [[0, 4], [0, 1], [3, 0]] = [[0, 3], [6, 0]]
        assert_eq!(c.get(0, 1).copied(), Some(3.0));
        assert_eq!(c.get(1, 0).copied(), Some(6.0));
        assert!(c.get(0, 0).is_none());
    }
}
