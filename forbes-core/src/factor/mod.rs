//! Direct factorizations.
//!
//! Every solver follows the same state machine: a fresh solver accepts one
//! successful [`FactoredSolver::factorize`] call, after which
//! [`FactoredSolver::solve`] may be called any number of times. The solver
//! keeps its own copy of the factorized values, so the caller's matrix can be
//! mutated or dropped afterwards.
//!
//! A factorization that fails numerically (not positive definite, zero pivot)
//! is not an error: `factorize` returns `Ok` with a non-success
//! [`FactorStatus`] and the solver stays unfactorized, so it may be retried.

mod cholesky;
mod context;
mod dense_ldl;
mod ldl;
mod sparse_ldl;
mod structured;
mod triangular;

pub use cholesky::CholeskyFactorization;
pub use context::SparseContext;
pub use dense_ldl::DenseLdl;
pub use ldl::LdlFactorization;
pub use structured::SLdlFactorization;

use crate::error::{MatrixError, Result};
use crate::matrix::{Matrix, MatrixType};

/// Outcome of a numerical factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorStatus {
    Success,
    /// Cholesky met a non-positive pivot
    NotPositiveDefinite,
    /// LDL met a zero (or below tolerance) pivot
    Singular,
    /// Non-zero status reported by the sparse factorization backend
    External(i32),
}

impl FactorStatus {
    pub fn is_success(self) -> bool {
        self == FactorStatus::Success
    }

    /// Integer code: 0 on success, negative otherwise.
    pub fn code(self) -> i32 {
        match self {
            FactorStatus::Success => 0,
            FactorStatus::NotPositiveDefinite => -1,
            FactorStatus::Singular => -2,
            FactorStatus::External(code) => code,
        }
    }
}

/// Factor once, solve many times.
pub trait FactoredSolver {
    /// Factorize a snapshot of `a`.
    ///
    /// Returns `AlreadyFactorized` after a previous successful call and a
    /// caller error for inputs the solver cannot accept. Numerical failure
    /// is reported through the returned status.
    fn factorize(&mut self, a: &Matrix<'_>) -> Result<FactorStatus>;

    /// Solve for every column of `rhs`; the result is Dense with the shape of `rhs`.
    fn solve(&self, rhs: &Matrix<'_>) -> Result<Matrix<'static>>;

    fn is_factorized(&self) -> bool;

    /// Order of the factorized system.
    fn dimension(&self) -> usize;

    /// Solve into a caller-supplied matrix (a writable view works too).
    fn solve_into(&self, rhs: &Matrix<'_>, out: &mut Matrix<'_>) -> Result<()> {
        check_solution_target("solve", rhs, out)?;
        let x = self.solve(rhs)?;
        copy_solution(&x, out)
    }
}

/// `out` must be a writable Dense matrix shaped like `rhs`. Checked before
/// any solve so a rejected target is never partially written.
pub(crate) fn check_solution_target(op: &'static str, rhs: &Matrix<'_>, out: &mut Matrix<'_>) -> Result<()> {
    if out.shape() != rhs.shape() {
        return Err(MatrixError::mismatch(op, rhs.shape(), out.shape()));
    }
    if out.kind() != MatrixType::Dense {
        return Err(MatrixError::invalid(format!(
            "{} writes a general dense result, got {:?} output",
            op,
            out.kind()
        )));
    }
    out.dense_mut()?;
    Ok(())
}

pub(crate) fn copy_solution(x: &Matrix<'_>, out: &mut Matrix<'_>) -> Result<()> {
    let (m, n) = x.shape();
    for j in 0..n {
        for i in 0..m {
            out.set(i, j, x.at(i, j))?;
        }
    }
    Ok(())
}

/// Apply an in-place single-vector solve to every column of `rhs`.
pub(crate) fn solve_columns(
    n: usize,
    rhs: &Matrix<'_>,
    mut solve_one: impl FnMut(&mut [f64]) -> Result<()>,
) -> Result<Matrix<'static>> {
    if rhs.rows() != n {
        return Err(MatrixError::mismatch("solve", (n, n), rhs.shape()));
    }
    let cols = rhs.cols();
    let mut values = rhs.to_vec();
    if n > 0 {
        for column in values.chunks_mut(n) {
            solve_one(column)?;
        }
    }
    Matrix::from_column_major(n, cols, values)
}

/// Reject non-square inputs and second factorizations.
pub(crate) fn check_factorizable(a: &Matrix<'_>, factorized: bool) -> Result<usize> {
    if factorized {
        return Err(MatrixError::AlreadyFactorized);
    }
    if a.rows() != a.cols() {
        return Err(MatrixError::invalid(format!(
            "factorization needs a square matrix, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    a.log_shape("factorize");
    Ok(a.rows())
}
