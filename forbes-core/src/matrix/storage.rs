//! Backing storage for matrix values.

use crate::error::{MatrixError, Result};

use super::sparse::SparseStorage;

/// Dense value buffer: owned, or borrowed from a parent matrix or a raw slice.
#[derive(Debug)]
pub(crate) enum Buffer<'a> {
    Owned(Vec<f64>),
    Shared(&'a [f64]),
    Exclusive(&'a mut [f64]),
}

impl<'a> Buffer<'a> {
    #[inline]
    pub(crate) fn as_slice(&self) -> &[f64] {
        match self {
            Buffer::Owned(v) => v,
            Buffer::Shared(s) => s,
            Buffer::Exclusive(s) => s,
        }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> Result<&mut [f64]> {
        match self {
            Buffer::Owned(v) => Ok(v),
            Buffer::Shared(_) => Err(MatrixError::ReadOnlyView),
            Buffer::Exclusive(s) => Ok(s),
        }
    }

    pub(crate) fn is_view(&self) -> bool {
        !matches!(self, Buffer::Owned(_))
    }
}

/// Columns `0..cols` of a column-major buffer with leading dimension `ld`,
/// each trimmed to `rows` values. An empty buffer yields no columns.
pub(crate) fn columns(values: &[f64], ld: usize, rows: usize, cols: usize) -> impl Iterator<Item = &[f64]> {
    values.chunks(ld.max(1)).take(cols).map(move |c| &c[..rows])
}

pub(crate) fn columns_mut(
    values: &mut [f64],
    ld: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = &mut [f64]> {
    values.chunks_mut(ld.max(1)).take(cols).map(move |c| &mut c[..rows])
}

/// Kind-tagged matrix data. The variant is the storage kind.
#[derive(Debug)]
pub(crate) enum Data<'a> {
    /// Column-major values with leading dimension `ld`
    Dense { buf: Buffer<'a>, ld: usize },
    Sparse(SparseStorage),
    Diagonal(Vec<f64>),
    /// Packed lower triangle
    Symmetric(Vec<f64>),
    /// Packed lower triangle
    Lower(Vec<f64>),
}

impl Data<'_> {
    /// Deep copy into owned storage. Dense windows are compacted to `ld == rows`.
    pub(crate) fn to_owned_data(&self, rows: usize, cols: usize) -> Data<'static> {
        match self {
            Data::Dense { buf, ld } => {
                let mut values = Vec::with_capacity(rows * cols);
                for col in columns(buf.as_slice(), *ld, rows, cols) {
                    values.extend_from_slice(col);
                }
                Data::Dense {
                    buf: Buffer::Owned(values),
                    ld: rows.max(1),
                }
            }
            Data::Sparse(s) => Data::Sparse(s.clone()),
            Data::Diagonal(d) => Data::Diagonal(d.clone()),
            Data::Symmetric(p) => Data::Symmetric(p.clone()),
            Data::Lower(p) => Data::Lower(p.clone()),
        }
    }
}
