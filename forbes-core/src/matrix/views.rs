//! Shallow views over dense buffers and submatrix copies.
//!
//! Views are only handed out for Dense storage. A view borrows its parent for
//! its whole lifetime, so the parent can neither be dropped nor resized while
//! the view exists.

use crate::error::{MatrixError, Result};

use super::{sparse, Buffer, Data, Matrix, MatrixType, SparseStorage, SparseSymmetry};

/// Physical placement of a contiguous vector view.
struct VectorLayout {
    rows: usize,
    cols: usize,
    ld: usize,
    transposed: bool,
}

fn vector_layout(parent: &Matrix<'_>, offset: usize, len: Option<usize>) -> Result<(VectorLayout, usize)> {
    let Data::Dense { ld, .. } = &parent.data else {
        return Err(MatrixError::invalid(format!(
            "shallow vectors need a dense parent, got {:?}",
            parent.kind()
        )));
    };
    if !parent.is_vector() {
        return Err(MatrixError::invalid(format!(
            "shallow vectors need a vector-shaped parent, got {}x{}",
            parent.rows(),
            parent.cols()
        )));
    }
    let (prows, pcols) = parent.physical_shape();
    let row_shaped = prows == 1 && pcols > 1;
    if row_shaped && *ld != 1 {
        return Err(MatrixError::invalid("parent vector is not contiguous"));
    }
    let extent = prows * pcols;
    let len = len.unwrap_or(extent.saturating_sub(offset));
    match offset.checked_add(len) {
        Some(end) if end <= extent => {}
        _ => {
            return Err(MatrixError::invalid(format!(
                "view [{}, {}+{}) exceeds parent length {}",
                offset, offset, len, extent
            )))
        }
    }
    let layout = if row_shaped {
        VectorLayout {
            rows: 1,
            cols: len,
            ld: 1,
            transposed: parent.is_transposed(),
        }
    } else {
        VectorLayout {
            rows: len,
            cols: 1,
            ld: len.max(1),
            transposed: parent.is_transposed(),
        }
    };
    Ok((layout, len))
}

fn check_slice_range(available: usize, offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(()),
        _ => Err(MatrixError::invalid(format!(
            "view [{}, {}+{}) exceeds buffer length {}",
            offset, offset, len, available
        ))),
    }
}

impl<'a> Matrix<'a> {
    /// Read-only vector view of `len` entries (default: the rest) of a dense
    /// vector, starting at `offset`.
    pub fn shallow_vector(parent: &'a Matrix<'_>, offset: usize, len: Option<usize>) -> Result<Self> {
        let (layout, len) = vector_layout(parent, offset, len)?;
        let Data::Dense { buf, .. } = &parent.data else {
            return Err(MatrixError::invalid("shallow vectors need a dense parent"));
        };
        let values = &buf.as_slice()[offset..offset + len];
        Ok(Matrix::from_parts(
            layout.rows,
            layout.cols,
            layout.transposed,
            Data::Dense {
                buf: Buffer::Shared(values),
                ld: layout.ld,
            },
        ))
    }

    /// Writable vector view; writes land in `parent`.
    pub fn shallow_vector_mut(
        parent: &'a mut Matrix<'_>,
        offset: usize,
        len: Option<usize>,
    ) -> Result<Self> {
        let (layout, len) = vector_layout(parent, offset, len)?;
        let (values, _) = parent.dense_mut()?;
        Ok(Matrix::from_parts(
            layout.rows,
            layout.cols,
            layout.transposed,
            Data::Dense {
                buf: Buffer::Exclusive(&mut values[offset..offset + len]),
                ld: layout.ld,
            },
        ))
    }

    /// Column vector view of `values[offset..offset + len]`.
    pub fn shallow_vector_from_slice(values: &'a [f64], len: usize, offset: usize) -> Result<Self> {
        check_slice_range(values.len(), offset, len)?;
        Ok(Matrix::from_parts(
            len,
            1,
            false,
            Data::Dense {
                buf: Buffer::Shared(&values[offset..offset + len]),
                ld: len.max(1),
            },
        ))
    }

    /// Writable column vector view of `values[offset..offset + len]`.
    pub fn shallow_vector_from_slice_mut(
        values: &'a mut [f64],
        len: usize,
        offset: usize,
    ) -> Result<Self> {
        check_slice_range(values.len(), offset, len)?;
        Ok(Matrix::from_parts(
            len,
            1,
            false,
            Data::Dense {
                buf: Buffer::Exclusive(&mut values[offset..offset + len]),
                ld: len.max(1),
            },
        ))
    }

    fn check_window(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> Result<()> {
        if r0 > r1 || c0 > c1 {
            return Err(MatrixError::invalid(format!(
                "empty window rows {}..={} cols {}..={}",
                r0, r1, c0, c1
            )));
        }
        if r1 >= self.rows() || c1 >= self.cols() {
            return Err(MatrixError::OutOfRange {
                row: r1,
                col: c1,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    /// Read-only view of the closed window `r0..=r1` x `c0..=c1` of a dense
    /// matrix. No values are copied.
    pub fn submatrix_view(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> Result<Matrix<'_>> {
        self.check_window(r0, r1, c0, c1)?;
        let Data::Dense { buf, ld } = &self.data else {
            return Err(MatrixError::invalid(format!(
                "submatrix views need dense storage, got {:?}",
                self.kind()
            )));
        };
        let (pr0, pr1, pc0, pc1) = if self.is_transposed() {
            (c0, c1, r0, r1)
        } else {
            (r0, r1, c0, c1)
        };
        let rows = pr1 - pr0 + 1;
        let cols = pc1 - pc0 + 1;
        let start = pr0 + pc0 * ld;
        let end = start + (cols - 1) * ld + rows;
        Ok(Matrix::from_parts(
            rows,
            cols,
            self.is_transposed(),
            Data::Dense {
                buf: Buffer::Shared(&buf.as_slice()[start..end]),
                ld: *ld,
            },
        ))
    }

    /// Independent copy of the closed window `r0..=r1` x `c0..=c1`.
    ///
    /// Supported for Dense and Sparse. The copy is untransposed; a square
    /// window on the diagonal of a symmetric-lower sparse matrix stays
    /// symmetric-lower.
    pub fn submatrix_copy(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> Result<Matrix<'static>> {
        self.check_window(r0, r1, c0, c1)?;
        match &self.data {
            Data::Dense { .. } => Ok(self.submatrix_view(r0, r1, c0, c1)?.to_dense()),
            Data::Sparse(s) => {
                let rows = r1 - r0 + 1;
                let cols = c1 - c0 + 1;
                let keep_symmetric =
                    s.symmetry == SparseSymmetry::SymmetricLower && r0 == c0 && r1 == c1;
                let mut triplets = Vec::new();
                self.for_each_stored(|i, j, v| {
                    if (r0..=r1).contains(&i) && (c0..=c1).contains(&j) {
                        let (ii, jj) = (i - r0, j - c0);
                        if !keep_symmetric || ii >= jj {
                            triplets.push((ii, jj, v));
                        }
                    }
                });
                let symmetry = if keep_symmetric {
                    SparseSymmetry::SymmetricLower
                } else {
                    SparseSymmetry::Unsymmetric
                };
                let csc = sparse::from_triplets(rows, cols, triplets);
                Ok(Matrix::from_parts(
                    rows,
                    cols,
                    false,
                    Data::Sparse(SparseStorage::from_csc(csc, symmetry)),
                ))
            }
            _ => Err(MatrixError::UnsupportedKind {
                op: "submatrix_copy",
                kind: self.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(rows: usize, cols: usize) -> Matrix<'static> {
        Matrix::from_column_major(rows, cols, (0..rows * cols).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn test_shallow_vector_shares_storage() {
        let mut parent = Matrix::column(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        {
            let mut view = Matrix::shallow_vector_mut(&mut parent, 1, Some(3)).unwrap();
            assert!(view.is_view());
            assert_eq!(view.shape(), (3, 1));
            view.set(0, 0, 20.0).unwrap();
            view.scale(2.0).unwrap();
        }
        assert_eq!(parent.to_vec(), vec![1.0, 40.0, 6.0, 8.0, 5.0]);

        let tail = Matrix::shallow_vector(&parent, 3, None).unwrap();
        assert_eq!(tail.to_vec(), vec![8.0, 5.0]);
    }

    #[test]
    fn test_shallow_vector_rejections() {
        let parent = Matrix::column(vec![0.0; 4]);
        assert!(Matrix::shallow_vector(&parent, 2, Some(3)).unwrap_err().is_invalid_argument());
        let square = Matrix::dense(2, 2);
        assert!(Matrix::shallow_vector(&square, 0, Some(1)).unwrap_err().is_invalid_argument());
        let diag = Matrix::diagonal(vec![1.0; 4]);
        assert!(Matrix::shallow_vector(&diag, 0, Some(1)).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_read_only_view_rejects_writes() {
        let parent = Matrix::column(vec![1.0, 2.0]);
        let mut view = Matrix::shallow_vector(&parent, 0, None).unwrap();
        assert!(matches!(view.set(0, 0, 3.0), Err(MatrixError::ReadOnlyView)));
        assert!(matches!(view.plusop(), Err(MatrixError::ReadOnlyView)));
    }

    #[test]
    fn test_slice_views() {
        let mut raw = vec![0.0, 1.0, 2.0, 3.0];
        {
            let mut v = Matrix::shallow_vector_from_slice_mut(&mut raw, 2, 1).unwrap();
            v.set(1, 0, -2.0).unwrap();
        }
        assert_eq!(raw, vec![0.0, 1.0, -2.0, 3.0]);
        assert!(Matrix::shallow_vector_from_slice(&raw, 4, 1).is_err());
    }

    #[test]
    fn test_submatrix_view_and_copy() {
        let a = counting(4, 5);
        let view = a.submatrix_view(1, 2, 2, 4).unwrap();
        assert_eq!(view.shape(), (2, 3));
        assert_eq!(view.get(1, 2).unwrap(), a.get(2, 4).unwrap());

        let copy = a.submatrix_copy(1, 2, 2, 4).unwrap();
        assert!(!copy.is_view());
        assert_eq!(copy, view.to_dense());
    }

    #[test]
    fn test_submatrix_honors_transpose() {
        let a = counting(3, 4).transposed();
        let copy = a.submatrix_copy(1, 3, 0, 1).unwrap();
        assert_eq!(copy.shape(), (3, 2));
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(copy.get(i, j).unwrap(), a.get(i + 1, j).unwrap());
            }
        }
    }

    #[test]
    fn test_sparse_submatrix_copy() {
        let s = Matrix::sparse_from_triplets(
            4,
            4,
            vec![(0, 0, 1.0), (2, 1, 5.0), (3, 3, 2.0), (3, 1, -1.0)],
            SparseSymmetry::SymmetricLower,
        )
        .unwrap();
        let block = s.submatrix_copy(1, 3, 1, 3).unwrap();
        assert_eq!(block.kind(), MatrixType::Sparse);
        assert_eq!(block.symmetry(), Some(SparseSymmetry::SymmetricLower));
        assert_eq!(block.get(0, 1).unwrap(), 5.0);

        let off = s.submatrix_copy(0, 1, 1, 3).unwrap();
        assert_eq!(off.symmetry(), Some(SparseSymmetry::Unsymmetric));
        assert_eq!(off.get(1, 1).unwrap(), 5.0);
        assert_eq!(off.get(1, 2).unwrap(), -1.0);

        assert!(s.submatrix_copy(2, 1, 0, 0).is_err());
        let d = Matrix::diagonal(vec![1.0; 3]);
        assert!(matches!(
            d.submatrix_copy(0, 1, 0, 1),
            Err(MatrixError::UnsupportedKind { .. })
        ));
    }
}
