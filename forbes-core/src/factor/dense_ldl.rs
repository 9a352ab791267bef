//! Dense symmetric indefinite LDLᵀ with Bunch–Kaufman pivoting.
//!
//! Computes `P A Pᵀ = L B Lᵀ` with `L` unit lower triangular and `B` block
//! diagonal with 1×1 and 2×2 blocks, using faer's LBLᵀ factorization. Only
//! the lower triangle of the input is read.

use faer::linalg::solvers::{Lblt, Solve};
use faer::{MatMut, MatRef, Side};
use log::trace;

use crate::matrix::Matrix;

use super::FactorStatus;

/// Dense LDLᵀ factor.
#[derive(Debug, Clone)]
pub struct DenseLdl {
    n: usize,
    lblt: Lblt<f64>,
    two_by_two: usize,
}

impl DenseLdl {
    /// Factorize the symmetric matrix whose lower triangle is read from `a`.
    pub fn factor(a: &Matrix<'_>, pivot_tol: f64) -> Result<Self, FactorStatus> {
        let n = a.rows();
        let mut w = vec![0.0; n * n];
        for j in 0..n {
            for i in j..n {
                w[i + j * n] = a.at(i, j);
            }
        }
        Self::factor_full(n, w, pivot_tol)
    }

    /// Factorize a column-major symmetric matrix; the strict upper part is ignored.
    pub(crate) fn factor_full(n: usize, w: Vec<f64>, pivot_tol: f64) -> Result<Self, FactorStatus> {
        let lblt = Lblt::new(MatRef::from_column_major_slice(&w, n, n), Side::Lower);

        let d = lblt.B_diag().column_vector();
        let s = lblt.B_subdiag().column_vector();
        let mut two_by_two = 0;
        let mut k = 0;
        while k < n {
            if s[k] == 0.0 {
                if d[k].abs() <= pivot_tol {
                    trace!("dense LDL: zero pivot at step {}", k);
                    return Err(FactorStatus::Singular);
                }
                k += 1;
            } else {
                let det = d[k] * d[k + 1] - s[k] * s[k];
                if det.abs() <= pivot_tol {
                    trace!("dense LDL: singular 2x2 block at step {}", k);
                    return Err(FactorStatus::Singular);
                }
                two_by_two += 1;
                k += 2;
            }
        }

        Ok(Self { n, lblt, two_by_two })
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Number of 2×2 pivot blocks used.
    pub fn two_by_two_pivots(&self) -> usize {
        self.two_by_two
    }

    /// Solve `A x = b` in place.
    pub fn solve_in_place(&self, x: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n);
        if self.n == 0 {
            return;
        }
        self.lblt
            .solve_in_place(MatMut::from_column_major_slice_mut(x, self.n, 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixType;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn symmetric(n: usize, rng: &mut ChaCha8Rng) -> Matrix<'static> {
        let mut a = Matrix::zeros(n, n, MatrixType::Symmetric).unwrap();
        for j in 0..n {
            for i in j..n {
                a.set(i, j, rng.gen_range(-1.0..1.0)).unwrap();
            }
        }
        a
    }

    fn residual(a: &Matrix<'_>, x: &[f64], b: &[f64]) -> f64 {
        let n = b.len();
        (0..n)
            .map(|i| {
                let ax: f64 = (0..n).map(|j| a.get(i, j).unwrap() * x[j]).sum();
                (ax - b[i]).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_random_indefinite() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for n in [1, 2, 5, 12] {
            let a = symmetric(n, &mut rng);
            let ldl = DenseLdl::factor(&a, 1e-14).unwrap();
            let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut x = b.clone();
            ldl.solve_in_place(&mut x);
            assert!(residual(&a, &x, &b) < 1e-8, "n = {}", n);
        }
    }

    #[test]
    fn test_zero_diagonal_needs_two_by_two() {
        // [[0, 1], [1, 0]] has no usable 1x1 pivot
        let a = Matrix::from_packed(2, MatrixType::Symmetric, vec![0.0, 1.0, 0.0]).unwrap();
        let ldl = DenseLdl::factor(&a, 1e-14).unwrap();
        assert_eq!(ldl.two_by_two_pivots(), 1);
        let mut x = vec![2.0, 3.0];
        ldl.solve_in_place(&mut x);
        assert!((x[0] - 3.0).abs() < 1e-14);
        assert!((x[1] - 2.0).abs() < 1e-14);
    }

    #[test]
    fn test_singular_reported() {
        let a = Matrix::from_packed(2, MatrixType::Symmetric, vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(DenseLdl::factor(&a, 1e-14).unwrap_err(), FactorStatus::Singular);
        let z = Matrix::dense(3, 3);
        assert_eq!(DenseLdl::factor(&z, 1e-14).unwrap_err(), FactorStatus::Singular);
    }

    #[test]
    fn test_interchange_pivot() {
        // small leading entry forces a row interchange
        let a = Matrix::from_packed(
            3,
            MatrixType::Symmetric,
            vec![1e-3, 2.0, 0.5, 5.0, 1.0, -3.0],
        )
        .unwrap();
        let ldl = DenseLdl::factor(&a, 1e-14).unwrap();
        let b = vec![1.0, -1.0, 2.0];
        let mut x = b.clone();
        ldl.solve_in_place(&mut x);
        assert!(residual(&a, &x, &b) < 1e-12);
    }
}
