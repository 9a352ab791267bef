//! Arithmetic on matrices.
//!
//! The checked methods (`plus`, `minus`, `multiply`, `quad`, ...) are the
//! primary API. The `std::ops` impls call them and panic on a dimension
//! mismatch, like the assertions in slice-level kernels.

use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

use crate::dispatch;
use crate::error::{MatrixError, Result};

use super::{Matrix, MatrixType};

impl<'a> Matrix<'a> {
    /// `self + other`; result kind from the addition table.
    pub fn plus(&self, other: &Matrix<'_>) -> Result<Matrix<'static>> {
        dispatch::combine(self, other, 1.0)
    }

    /// `self - other`; result kind from the addition table.
    pub fn minus(&self, other: &Matrix<'_>) -> Result<Matrix<'static>> {
        dispatch::combine(self, other, -1.0)
    }

    /// Matrix product `self * other`; result kind from the multiplication table.
    pub fn multiply(&self, other: &Matrix<'_>) -> Result<Matrix<'static>> {
        dispatch::multiply(self, other)
    }

    /// `0.5 * x' A x`.
    pub fn quad(&self, x: &Matrix<'_>) -> Result<f64> {
        dispatch::quad(self, x)
    }

    /// `0.5 * x' A x + q' x`.
    pub fn quad_linear(&self, x: &Matrix<'_>, q: &Matrix<'_>) -> Result<f64> {
        dispatch::quad_linear(self, x, q)
    }

    /// `self += beta * other`. Dense matrices (views included) are updated in
    /// place; other kinds take the kind the addition table assigns.
    fn accumulate(&mut self, other: &Matrix<'_>, beta: f64) -> Result<()> {
        if self.shape() != other.shape() {
            let op = if beta < 0.0 { "-=" } else { "+=" };
            return Err(MatrixError::mismatch(op, self.shape(), other.shape()));
        }
        if self.kind() == MatrixType::Dense {
            let transposed = self.is_transposed();
            let (values, ld) = self.dense_mut()?;
            other.for_each_stored(|i, j, v| {
                let idx = if transposed { j + i * ld } else { i + j * ld };
                values[idx] += beta * v;
            });
            return Ok(());
        }
        let sum = dispatch::combine(self, other, beta)?;
        *self = Matrix::rebind(sum);
        Ok(())
    }

    /// Checked `self += other`.
    pub fn plus_assign(&mut self, other: &Matrix<'_>) -> Result<()> {
        self.accumulate(other, 1.0)
    }

    /// Checked `self -= other`.
    pub fn minus_assign(&mut self, other: &Matrix<'_>) -> Result<()> {
        self.accumulate(other, -1.0)
    }

    /// Product of the dense windows `self[r0..=r1, c0..=c1]` and
    /// `rhs[rr0..=rr1, rc0..=rc1]`, computed through strided views.
    pub fn multiply_submatrix(
        &self,
        rhs: &Matrix<'_>,
        (r0, r1, c0, c1): (usize, usize, usize, usize),
        (rr0, rr1, rc0, rc1): (usize, usize, usize, usize),
    ) -> Result<Matrix<'static>> {
        if self.kind() != MatrixType::Dense || rhs.kind() != MatrixType::Dense {
            return Err(MatrixError::invalid("multiply_submatrix needs dense operands"));
        }
        let left = self.submatrix_view(r0, r1, c0, c1)?;
        let right = rhs.submatrix_view(rr0, rr1, rc0, rc1)?;
        dispatch::multiply(&left, &right)
    }
}

impl Add<&Matrix<'_>> for &Matrix<'_> {
    type Output = Matrix<'static>;

    fn add(self, rhs: &Matrix<'_>) -> Matrix<'static> {
        self.plus(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Sub<&Matrix<'_>> for &Matrix<'_> {
    type Output = Matrix<'static>;

    fn sub(self, rhs: &Matrix<'_>) -> Matrix<'static> {
        self.minus(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Mul<&Matrix<'_>> for &Matrix<'_> {
    type Output = Matrix<'static>;

    fn mul(self, rhs: &Matrix<'_>) -> Matrix<'static> {
        self.multiply(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl AddAssign<&Matrix<'_>> for Matrix<'_> {
    fn add_assign(&mut self, rhs: &Matrix<'_>) {
        self.plus_assign(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl SubAssign<&Matrix<'_>> for Matrix<'_> {
    fn sub_assign(&mut self, rhs: &Matrix<'_>) {
        self.minus_assign(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl MulAssign<f64> for Matrix<'_> {
    fn mul_assign(&mut self, alpha: f64) {
        self.scale(alpha).unwrap_or_else(|e| panic!("{}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseSymmetry;

    fn sample(kind: MatrixType) -> Matrix<'static> {
        let n = 3;
        let mut a = Matrix::zeros(n, n, kind).unwrap();
        for j in 0..n {
            for i in 0..n {
                let _ = a.set(i, j, (i + 2 * j) as f64 - 1.5);
            }
        }
        a
    }

    fn reference_product(a: &Matrix<'_>, b: &Matrix<'_>) -> Vec<f64> {
        let (m, k, n) = (a.rows(), a.cols(), b.cols());
        let mut out = vec![0.0; m * n];
        for j in 0..n {
            for i in 0..m {
                for p in 0..k {
                    out[i + j * m] += a.get(i, p).unwrap() * b.get(p, j).unwrap();
                }
            }
        }
        out
    }

    #[test]
    fn test_add_and_multiply_match_reference_for_all_pairs() {
        for ka in MatrixType::ALL {
            for kb in MatrixType::ALL {
                let a = sample(ka);
                let b = sample(kb);

                let sum = a.plus(&b).unwrap();
                assert_eq!(sum.kind(), crate::dispatch::add_result_kind(ka, kb));
                let expected: Vec<f64> =
                    a.to_vec().iter().zip(b.to_vec()).map(|(x, y)| x + y).collect();
                assert_eq!(sum.to_vec(), expected, "{:?} + {:?}", ka, kb);

                let prod = a.multiply(&b).unwrap();
                assert_eq!(prod.kind(), crate::dispatch::mul_result_kind(ka, kb));
                for (got, want) in prod.to_vec().iter().zip(reference_product(&a, &b)) {
                    assert!((got - want).abs() < 1e-10, "{:?} * {:?}", ka, kb);
                }
            }
        }
    }

    #[test]
    fn test_transposed_operands_are_remapped() {
        for ka in MatrixType::ALL {
            for kb in MatrixType::ALL {
                let a = sample(ka).transposed();
                let b = sample(kb);
                let prod = a.multiply(&b).unwrap();
                for (got, want) in prod.to_vec().iter().zip(reference_product(&a, &b)) {
                    assert!((got - want).abs() < 1e-10, "{:?}' * {:?}", ka, kb);
                }
                let diff = a.minus(&b).unwrap();
                assert_eq!(diff.kind(), crate::dispatch::add_result_kind(ka, kb));
                let expected: Vec<f64> =
                    a.to_vec().iter().zip(b.to_vec()).map(|(x, y)| x - y).collect();
                assert_eq!(diff.to_vec(), expected, "{:?}' - {:?}", ka, kb);
            }
        }
    }

    #[test]
    fn test_diagonal_scaling_sides() {
        let a = Matrix::from_column_major(2, 2, vec![1.0, 3.0, 2.0, 4.0]).unwrap();
        let d = Matrix::diagonal(vec![10.0, 100.0]);
        // right multiply scales columns
        assert_eq!((&a * &d).to_vec(), vec![10.0, 30.0, 200.0, 400.0]);
        // left multiply scales rows
        assert_eq!((&d * &a).to_vec(), vec![10.0, 300.0, 20.0, 400.0]);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let a = Matrix::dense(2, 3);
        let b = Matrix::dense(2, 2);
        assert!(a.plus(&b).unwrap_err().is_invalid_argument());
        assert!(a.multiply(&b).unwrap_err().is_invalid_argument());

        let mut c = Matrix::dense(2, 2);
        c.set(0, 0, 1.0).unwrap();
        assert!(c.plus_assign(&a).is_err());
        assert_eq!(c.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    #[should_panic]
    fn test_operator_panics_on_mismatch() {
        let _ = &Matrix::dense(2, 3) + &Matrix::dense(3, 2);
    }

    #[test]
    fn test_in_place_ops() {
        let mut a = Matrix::dense(2, 2);
        a += &Matrix::diagonal(vec![1.0, 2.0]);
        a -= &Matrix::from_column_major(2, 2, vec![0.5, 0.0, 0.0, 0.5]).unwrap();
        a *= 2.0;
        assert_eq!(a.to_vec(), vec![1.0, 0.0, 0.0, 3.0]);

        let mut d = Matrix::diagonal(vec![1.0, 1.0]);
        d += &Matrix::diagonal(vec![2.0, 3.0]);
        assert_eq!(d.kind(), MatrixType::Diagonal);
        d += &Matrix::dense(2, 2);
        assert_eq!(d.kind(), MatrixType::Dense);
    }

    #[test]
    fn test_in_place_add_through_view() {
        let mut parent = Matrix::column(vec![1.0, 2.0, 3.0]);
        {
            let mut view = Matrix::shallow_vector_mut(&mut parent, 1, Some(2)).unwrap();
            view += &Matrix::column(vec![10.0, 20.0]);
        }
        assert_eq!(parent.to_vec(), vec![1.0, 12.0, 23.0]);
    }

    #[test]
    fn test_quad_fast_paths() {
        let x = Matrix::column(vec![1.0, -2.0, 3.0]);
        for kind in MatrixType::ALL {
            let a = sample(kind);
            let mut expected = 0.0;
            for i in 0..3 {
                for j in 0..3 {
                    expected += x.get(i, 0).unwrap() * x.get(j, 0).unwrap() * a.get(i, j).unwrap();
                }
            }
            let got = a.quad(&x).unwrap();
            assert!((got - 0.5 * expected).abs() < 1e-10, "{:?}", kind);
        }

        let q = Matrix::column(vec![1.0, 1.0, 1.0]);
        let d = Matrix::diagonal(vec![1.0, 2.0, 3.0]);
        let base = d.quad(&x).unwrap();
        assert!((d.quad_linear(&x, &q).unwrap() - (base + 2.0)).abs() < 1e-12);
        assert!(d.quad(&Matrix::column(vec![1.0; 2])).is_err());
    }

    #[test]
    fn test_sparse_sums_keep_symmetry() {
        let s = Matrix::sparse_from_triplets(
            3,
            3,
            vec![(0, 0, 1.0), (2, 0, 2.0)],
            SparseSymmetry::SymmetricLower,
        )
        .unwrap();
        let sum = s.plus(&Matrix::diagonal(vec![1.0, 1.0, 1.0])).unwrap();
        assert_eq!(sum.symmetry(), Some(SparseSymmetry::SymmetricLower));
        assert_eq!(sum.get(0, 2).unwrap(), 2.0);
        assert_eq!(sum.get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_multiply_submatrix() {
        let a = Matrix::from_column_major(3, 3, (1..=9).map(|v| v as f64).collect()).unwrap();
        let b = Matrix::from_column_major(3, 2, vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]).unwrap();
        let prod = a.multiply_submatrix(&b, (0, 1, 1, 2), (0, 1, 0, 1)).unwrap();
        let expected = a
            .submatrix_copy(0, 1, 1, 2)
            .unwrap()
            .multiply(&b.submatrix_copy(0, 1, 0, 1).unwrap())
            .unwrap();
        assert_eq!(prod, expected);
        assert!(a
            .multiply_submatrix(&Matrix::diagonal(vec![1.0; 3]), (0, 1, 0, 1), (0, 1, 0, 1))
            .is_err());
    }
}
