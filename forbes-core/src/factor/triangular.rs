//! Triangular solves for Cholesky factors.

use crate::error::{MatrixError, Result};
use crate::matrix::sparse::{self, SparseCsc};
use crate::matrix::{packed_index, Data, Matrix};

fn zero_diagonal(j: usize) -> MatrixError {
    MatrixError::invalid(format!("triangular factor has a zero diagonal at {}", j))
}

/// Solve `L x = b` in place, `L` packed lower (column-major).
pub(crate) fn forward_packed(n: usize, l: &[f64], x: &mut [f64]) -> Result<()> {
    for j in 0..n {
        let djj = l[packed_index(n, j, j)];
        if djj == 0.0 {
            return Err(zero_diagonal(j));
        }
        x[j] /= djj;
        let xj = x[j];
        for i in j + 1..n {
            x[i] -= l[packed_index(n, i, j)] * xj;
        }
    }
    Ok(())
}

/// Solve `Lᵀ x = b` in place, `L` packed lower (column-major).
pub(crate) fn backward_packed(n: usize, l: &[f64], x: &mut [f64]) -> Result<()> {
    for j in (0..n).rev() {
        let mut s = x[j];
        for i in j + 1..n {
            s -= l[packed_index(n, i, j)] * x[i];
        }
        let djj = l[packed_index(n, j, j)];
        if djj == 0.0 {
            return Err(zero_diagonal(j));
        }
        x[j] = s / djj;
    }
    Ok(())
}

/// Lower-triangular factor in CSC form with the diagonal split out.
pub(crate) struct LowerCsc {
    strict: SparseCsc,
    diag: Vec<f64>,
}

impl LowerCsc {
    /// Lower triangle of the logical matrix `l`; entries above the diagonal
    /// are ignored.
    pub(crate) fn from_matrix(l: &Matrix<'_>) -> Self {
        let n = l.rows();
        let mut diag = vec![0.0; n];
        let mut triplets = Vec::new();
        l.for_each_stored(|i, j, v| {
            if i == j {
                diag[i] = v;
            } else if i > j && v != 0.0 {
                triplets.push((i, j, v));
            }
        });
        Self {
            strict: sparse::from_triplets(n, n, triplets),
            diag,
        }
    }

    fn check_diagonal(&self) -> Result<()> {
        match self.diag.iter().position(|&d| d == 0.0) {
            Some(j) => Err(zero_diagonal(j)),
            None => Ok(()),
        }
    }

    /// Solve `L x = b` in place.
    pub(crate) fn forward(&self, x: &mut [f64]) -> Result<()> {
        self.check_diagonal()?;
        for (j, col) in self.strict.outer_iterator().enumerate() {
            x[j] /= self.diag[j];
            let xj = x[j];
            for (i, &v) in col.iter() {
                x[i] -= v * xj;
            }
        }
        Ok(())
    }

    /// Solve `Lᵀ x = b` in place.
    pub(crate) fn backward(&self, x: &mut [f64]) -> Result<()> {
        self.check_diagonal()?;
        for j in (0..self.diag.len()).rev() {
            let mut s = x[j];
            if let Some(col) = self.strict.outer_view(j) {
                for (i, &v) in col.iter() {
                    s -= v * x[i];
                }
            }
            x[j] = s / self.diag[j];
        }
        Ok(())
    }
}

/// A Cholesky factor `L` (`A = L Lᵀ`) prepared for substitution.
///
/// A packed, untransposed LowerTriangular factor is used in place; any other
/// kind is read through its logical lower triangle.
pub(crate) enum CholeskyFactorRef<'m> {
    Packed { n: usize, values: &'m [f64] },
    Csc(LowerCsc),
}

impl<'m> CholeskyFactorRef<'m> {
    pub(crate) fn new(l: &'m Matrix<'_>) -> Result<Self> {
        if !l.is_square() {
            return Err(MatrixError::invalid(format!(
                "Cholesky factor must be square, got {}x{}",
                l.rows(),
                l.cols()
            )));
        }
        Ok(match &l.data {
            Data::Lower(values) if !l.is_transposed() => CholeskyFactorRef::Packed {
                n: l.rows(),
                values,
            },
            _ => CholeskyFactorRef::Csc(LowerCsc::from_matrix(l)),
        })
    }

    /// Forward then backward substitution, in place.
    pub(crate) fn solve(&self, x: &mut [f64]) -> Result<()> {
        match self {
            CholeskyFactorRef::Packed { n, values } => {
                forward_packed(*n, values, x)?;
                backward_packed(*n, values, x)
            }
            CholeskyFactorRef::Csc(lower) => {
                lower.forward(x)?;
                lower.backward(x)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixType;

    // L = [[2, 0, 0], [1, 3, 0], [4, 5, 6]]
    fn packed_l() -> Vec<f64> {
        vec![2.0, 1.0, 4.0, 3.0, 5.0, 6.0]
    }

    #[test]
    fn test_packed_forward_backward() {
        let l = packed_l();
        // L * [1, 1, 1] = [2, 4, 15]
        let mut x = vec![2.0, 4.0, 15.0];
        forward_packed(3, &l, &mut x).unwrap();
        for v in &x {
            assert!((v - 1.0).abs() < 1e-14);
        }
        // L' * [1, 1, 1] = [7, 8, 6]
        let mut y = vec![7.0, 8.0, 6.0];
        backward_packed(3, &l, &mut y).unwrap();
        for v in &y {
            assert!((v - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_csc_matches_packed() {
        let m = Matrix::from_packed(3, MatrixType::LowerTriangular, packed_l()).unwrap();
        let lower = LowerCsc::from_matrix(&m);
        let mut a = vec![1.0, -2.0, 0.5];
        let mut b = a.clone();
        lower.forward(&mut a).unwrap();
        lower.backward(&mut a).unwrap();
        forward_packed(3, &packed_l(), &mut b).unwrap();
        backward_packed(3, &packed_l(), &mut b).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-14);
        }
    }

    #[test]
    fn test_zero_diagonal_rejected() {
        let mut x = vec![1.0, 1.0];
        let l = vec![1.0, 0.0, 0.0];
        assert!(forward_packed(2, &l, &mut x).is_err());
    }
}
