//! Linear operators backed by matrices.

use crate::error::{MatrixError, Result};
use crate::matrix::{Data, Matrix};

/// `x -> A x` and its adjoint.
pub trait LinearOperator {
    /// `(rows, cols)` of the operator.
    fn dims(&self) -> (usize, usize);

    /// `y := gamma * y + alpha * A x`
    fn call_scaled(&self, y: &mut [f64], alpha: f64, x: &[f64], gamma: f64) -> Result<()>;

    /// `y := gamma * y + alpha * Aᵀ x`
    fn call_adjoint_scaled(&self, y: &mut [f64], alpha: f64, x: &[f64], gamma: f64) -> Result<()>;

    fn call(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.dims().0];
        self.call_scaled(&mut y, 1.0, x, 0.0)?;
        Ok(y)
    }

    fn call_adjoint(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.dims().1];
        self.call_adjoint_scaled(&mut y, 1.0, x, 0.0)?;
        Ok(y)
    }
}

/// Operator view of a matrix of any kind.
pub struct MatOp<'m, 'a> {
    a: &'m Matrix<'a>,
}

impl<'m, 'a> MatOp<'m, 'a> {
    pub fn new(a: &'m Matrix<'a>) -> Self {
        Self { a }
    }

    pub fn matrix(&self) -> &Matrix<'a> {
        self.a
    }

    /// `y := gamma * y + alpha * op(A) x`, `op` chosen by `adjoint`.
    fn apply(&self, adjoint: bool, y: &mut [f64], alpha: f64, x: &[f64], gamma: f64) -> Result<()> {
        let (m, n) = self.a.shape();
        let (out_len, in_len) = if adjoint { (n, m) } else { (m, n) };
        if x.len() != in_len || y.len() != out_len {
            return Err(MatrixError::mismatch("operator call", (out_len, in_len), (y.len(), x.len())));
        }

        if let Data::Sparse(s) = &self.a.data {
            // physical orientation of the stored CSC
            s.spmv(adjoint != self.a.is_transposed(), x, y, alpha, gamma);
            return Ok(());
        }

        if gamma == 0.0 {
            y.fill(0.0);
        } else if gamma != 1.0 {
            y.iter_mut().for_each(|v| *v *= gamma);
        }
        if alpha == 0.0 {
            return Ok(());
        }
        self.a.for_each_stored(|i, j, v| {
            if adjoint {
                y[j] += alpha * v * x[i];
            } else {
                y[i] += alpha * v * x[j];
            }
        });
        Ok(())
    }
}

impl LinearOperator for MatOp<'_, '_> {
    fn dims(&self) -> (usize, usize) {
        self.a.shape()
    }

    fn call_scaled(&self, y: &mut [f64], alpha: f64, x: &[f64], gamma: f64) -> Result<()> {
        self.apply(false, y, alpha, x, gamma)
    }

    fn call_adjoint_scaled(&self, y: &mut [f64], alpha: f64, x: &[f64], gamma: f64) -> Result<()> {
        self.apply(true, y, alpha, x, gamma)
    }
}
