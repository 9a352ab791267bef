//! Matrix construction helpers: random fills, identities, sparse loading and
//! shallow vector views.
//!
//! Sparse triplet file format:
//!
//! ```text
//! % comment lines start with '%' or '#'
//! rows cols nnz
//! row col value      (nnz lines, 0-based indices)
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use rand::Rng;

use crate::error::{MatrixError, Result};
use crate::matrix::{Matrix, MatrixType, SparseSymmetry};

/// Random matrix of `kind` whose writable positions hold values uniform in
/// `[offset, offset + scale)`. Positions outside the kind's structure stay
/// zero; a Sparse result stores every position.
pub fn make_random_matrix<R: Rng>(
    rng: &mut R,
    rows: usize,
    cols: usize,
    offset: f64,
    scale: f64,
    kind: MatrixType,
) -> Result<Matrix<'static>> {
    let mut draw = || offset + scale * rng.gen::<f64>();
    match kind {
        MatrixType::Sparse => {
            let mut triplets = Vec::with_capacity(rows * cols);
            for j in 0..cols {
                for i in 0..rows {
                    triplets.push((i, j, draw()));
                }
            }
            Matrix::sparse_from_triplets(rows, cols, triplets, SparseSymmetry::Unsymmetric)
        }
        _ => {
            let mut a = Matrix::zeros(rows, cols, kind)?;
            for j in 0..cols {
                for i in 0..rows {
                    let writable = match kind {
                        MatrixType::Diagonal => i == j,
                        MatrixType::Symmetric | MatrixType::LowerTriangular => i >= j,
                        _ => true,
                    };
                    if writable {
                        a.set(i, j, draw())?;
                    }
                }
            }
            Ok(a)
        }
    }
}

/// `alpha * I` as a Diagonal matrix.
pub fn make_identity(n: usize, alpha: f64) -> Matrix<'static> {
    Matrix::diagonal(vec![alpha; n])
}

/// Empty sparse matrix with capacity hint `max_nnz`.
pub fn make_sparse(rows: usize, cols: usize, max_nnz: usize, symmetry: SparseSymmetry) -> Result<Matrix<'static>> {
    if symmetry == SparseSymmetry::SymmetricLower && rows != cols {
        return Err(MatrixError::invalid(format!(
            "symmetric sparse matrix must be square, got {}x{}",
            rows, cols
        )));
    }
    Ok(Matrix::sparse(rows, cols, max_nnz, symmetry))
}

/// Sparse matrix with up to `nnz` entries at random positions, values uniform
/// in `[offset, offset + scale)`. Symmetric-lower matrices draw positions
/// with `row >= col`. Colliding positions keep the last value.
pub fn make_random_sparse<R: Rng>(
    rng: &mut R,
    rows: usize,
    cols: usize,
    nnz: usize,
    offset: f64,
    scale: f64,
    symmetry: SparseSymmetry,
) -> Result<Matrix<'static>> {
    let mut a = make_sparse(rows, cols, nnz, symmetry)?;
    if rows == 0 || cols == 0 {
        return Ok(a);
    }
    for _ in 0..nnz {
        let mut i = rng.gen_range(0..rows);
        let mut j = rng.gen_range(0..cols);
        if symmetry == SparseSymmetry::SymmetricLower && i < j {
            std::mem::swap(&mut i, &mut j);
        }
        a.set(i, j, offset + scale * rng.gen::<f64>())?;
    }
    Ok(a)
}

fn parse_error(line: usize, msg: impl Into<String>) -> MatrixError {
    MatrixError::Parse {
        line,
        msg: msg.into(),
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    field
        .ok_or_else(|| parse_error(line, format!("missing {}", what)))?
        .parse::<T>()
        .map_err(|e| parse_error(line, format!("invalid {}: {}", what, e)))
}

/// Load a sparse matrix in triplet format.
///
/// Exactly `nnz` entries must follow the header. For symmetric-lower storage
/// an entry above the diagonal is stored at its mirrored position. Repeated
/// coordinates keep the last value.
pub fn read_sparse<R: BufRead>(reader: R, symmetry: SparseSymmetry) -> Result<Matrix<'static>> {
    let mut header: Option<(usize, usize, usize)> = None;
    let mut matrix: Option<Matrix<'static>> = None;
    let mut seen = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;
        let content = line.trim();
        if content.is_empty() || content.starts_with('%') || content.starts_with('#') {
            continue;
        }
        let mut fields = content.split_whitespace();

        let Some((rows, cols, nnz)) = header else {
            let rows = parse_field(fields.next(), lineno, "row count")?;
            let cols = parse_field(fields.next(), lineno, "column count")?;
            let nnz = parse_field(fields.next(), lineno, "nonzero count")?;
            if fields.next().is_some() {
                return Err(parse_error(lineno, "header must be `rows cols nnz`"));
            }
            if symmetry == SparseSymmetry::SymmetricLower && rows != cols {
                return Err(parse_error(
                    lineno,
                    format!("symmetric matrix must be square, got {}x{}", rows, cols),
                ));
            }
            header = Some((rows, cols, nnz));
            matrix = Some(Matrix::sparse(rows, cols, nnz, symmetry));
            continue;
        };

        if seen == nnz {
            return Err(parse_error(lineno, format!("more than the declared {} entries", nnz)));
        }
        let i: usize = parse_field(fields.next(), lineno, "row index")?;
        let j: usize = parse_field(fields.next(), lineno, "column index")?;
        let v: f64 = parse_field(fields.next(), lineno, "value")?;
        if fields.next().is_some() {
            return Err(parse_error(lineno, "entry must be `row col value`"));
        }
        if i >= rows || j >= cols {
            return Err(parse_error(
                lineno,
                format!("entry ({}, {}) outside a {}x{} matrix", i, j, rows, cols),
            ));
        }
        let (i, j) = if symmetry == SparseSymmetry::SymmetricLower && i < j {
            (j, i)
        } else {
            (i, j)
        };
        if let Some(m) = matrix.as_mut() {
            m.set(i, j, v)?;
        }
        seen += 1;
    }

    let (Some((_, _, nnz)), Some(m)) = (header, matrix) else {
        return Err(parse_error(0, "missing header"));
    };
    if seen != nnz {
        return Err(parse_error(0, format!("expected {} entries, found {}", nnz, seen)));
    }
    debug!("read sparse {}x{} with {} entries", m.rows(), m.cols(), m.nnz());
    Ok(m)
}

/// Load a sparse triplet file from disk.
pub fn read_sparse_file(path: &Path, symmetry: SparseSymmetry) -> Result<Matrix<'static>> {
    let file = File::open(path)?;
    read_sparse(BufReader::new(file), symmetry)
}

/// Read-only view of `parent[offset..offset + len]`; `len` defaults to the rest.
pub fn shallow_vector<'a>(parent: &'a Matrix<'_>, offset: usize, len: Option<usize>) -> Result<Matrix<'a>> {
    Matrix::shallow_vector(parent, offset, len)
}

/// Read-only column view of `values[offset..offset + len]`.
pub fn shallow_vector_from_slice(values: &[f64], len: usize, offset: usize) -> Result<Matrix<'_>> {
    Matrix::shallow_vector_from_slice(values, len, offset)
}
