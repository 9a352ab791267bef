//! Cholesky factorization `A = L Lᵀ`.
//!
//! Dense kinds go through `nalgebra`; Sparse matrices are factorized with the
//! sparse LDLᵀ backend and rescaled to `L·sqrt(D)`.

use log::{info, warn};
use nalgebra::{Cholesky, DMatrix, Dyn};

use crate::error::{MatrixError, Result};
use crate::matrix::sparse::SparseCsc;
use crate::matrix::{packed_len, Data, Matrix, MatrixType, SparseStorage, SparseSymmetry};
use crate::settings::LinalgSettings;

use super::context::SparseContext;
use super::sparse_ldl::SparseLdlFactor;
use super::triangular::CholeskyFactorRef;
use super::{
    check_factorizable, check_solution_target, copy_solution, solve_columns, FactorStatus, FactoredSolver,
};

fn upper_triangle(a: &Matrix<'_>) -> Result<SparseCsc> {
    match &a.data {
        Data::Sparse(s) => Ok(s.upper_triangle_with_diagonal()),
        _ => Err(MatrixError::UnsupportedKind {
            op: "sparse factorization",
            kind: a.kind(),
        }),
    }
}

/// Dense symmetric image of the lower triangle of `a`.
fn lower_as_dmatrix(a: &Matrix<'_>) -> DMatrix<f64> {
    let n = a.rows();
    DMatrix::from_fn(n, n, |i, j| if i >= j { a.at(i, j) } else { a.at(j, i) })
}

fn dense_cholesky(a: &Matrix<'_>) -> Option<Cholesky<f64, Dyn>> {
    Cholesky::new(lower_as_dmatrix(a))
}

/// Sparse LDLᵀ whose pivots must all be positive.
fn positive_sparse_factor<'c>(
    ctx: &'c SparseContext,
    a: &Matrix<'_>,
) -> Result<std::result::Result<SparseLdlFactor<'c>, FactorStatus>> {
    let upper = upper_triangle(a)?;
    let settings = ctx.settings();
    let factor = match SparseLdlFactor::factor(ctx, &upper, settings.static_reg, settings.pivot_tol) {
        Ok(f) => f,
        Err(FactorStatus::Singular) => return Ok(Err(FactorStatus::NotPositiveDefinite)),
        Err(status) => return Ok(Err(status)),
    };
    if let Some(k) = factor.d().iter().position(|&d| d <= 0.0) {
        warn!("Cholesky: pivot {} = {:e} is not positive", k, factor.d()[k]);
        return Ok(Err(FactorStatus::NotPositiveDefinite));
    }
    Ok(Ok(factor))
}

fn check_cholesky_kind(a: &Matrix<'_>) -> Result<()> {
    if a.kind() == MatrixType::LowerTriangular {
        return Err(MatrixError::UnsupportedKind {
            op: "cholesky",
            kind: a.kind(),
        });
    }
    Ok(())
}

impl<'a> Matrix<'a> {
    /// Compute `L` with `self = L Lᵀ` and store it in `out_l`.
    ///
    /// Dense, Diagonal and Symmetric inputs give a packed LowerTriangular
    /// factor; Sparse inputs give a Sparse lower factor. Only the lower
    /// triangle of the input is read. A matrix that is not positive definite
    /// yields `NotPositiveDefinite` and leaves `out_l` untouched.
    pub fn cholesky(&self, out_l: &mut Matrix<'_>) -> Result<FactorStatus> {
        check_factorizable(self, false)?;
        check_cholesky_kind(self)?;
        let n = self.rows();

        if self.kind() == MatrixType::Sparse {
            let ctx = SparseContext::new(LinalgSettings::default())?;
            let l = match positive_sparse_factor(&ctx, self)? {
                Ok(factor) => factor.cholesky_factor(),
                Err(status) => return Ok(status),
            };
            *out_l = Matrix::from_parts(
                n,
                n,
                false,
                Data::Sparse(SparseStorage::from_csc(l, SparseSymmetry::Unsymmetric)),
            );
            ctx.finish();
            return Ok(FactorStatus::Success);
        }

        let Some(chol) = dense_cholesky(self) else {
            warn!("Cholesky: {}x{} matrix is not positive definite", n, n);
            return Ok(FactorStatus::NotPositiveDefinite);
        };
        let l = chol.l();
        let mut packed = Vec::with_capacity(packed_len(n));
        for j in 0..n {
            for i in j..n {
                packed.push(l[(i, j)]);
            }
        }
        *out_l = Matrix::from_packed(n, MatrixType::LowerTriangular, packed)?;
        Ok(FactorStatus::Success)
    }

    /// Solve `L Lᵀ X = B` with `self` as `L`, one column of `rhs` at a time.
    pub fn solve_cholesky_system(&self, rhs: &Matrix<'_>) -> Result<Matrix<'static>> {
        let factor = CholeskyFactorRef::new(self)?;
        solve_columns(self.rows(), rhs, |x| factor.solve(x))
    }

    /// Solve into a caller-supplied matrix of the shape of `rhs`.
    pub fn solve_cholesky_system_into(&self, out_x: &mut Matrix<'_>, rhs: &Matrix<'_>) -> Result<()> {
        check_solution_target("solve_cholesky_system", rhs, out_x)?;
        let x = self.solve_cholesky_system(rhs)?;
        copy_solution(&x, out_x)
    }
}

enum CholeskyFactor<'c> {
    Dense(Cholesky<f64, Dyn>),
    Sparse(SparseLdlFactor<'c>),
}

/// Cholesky solver over a private snapshot of the factorized matrix.
pub struct CholeskyFactorization<'c> {
    ctx: Option<&'c SparseContext>,
    settings: LinalgSettings,
    n: usize,
    factor: Option<CholeskyFactor<'c>>,
}

impl<'c> CholeskyFactorization<'c> {
    /// Solver for the dense kinds.
    pub fn new(settings: LinalgSettings) -> Self {
        Self {
            ctx: None,
            settings,
            n: 0,
            factor: None,
        }
    }

    /// Solver that also accepts Sparse matrices through `ctx`.
    pub fn with_context(ctx: &'c SparseContext) -> Self {
        Self {
            ctx: Some(ctx),
            settings: ctx.settings().clone(),
            n: 0,
            factor: None,
        }
    }
}

impl FactoredSolver for CholeskyFactorization<'_> {
    fn factorize(&mut self, a: &Matrix<'_>) -> Result<FactorStatus> {
        let n = check_factorizable(a, self.factor.is_some())?;
        check_cholesky_kind(a)?;

        let factor = if a.kind() == MatrixType::Sparse {
            let ctx = self.ctx.ok_or_else(|| {
                MatrixError::invalid("sparse Cholesky needs a solver created with a SparseContext")
            })?;
            match positive_sparse_factor(ctx, a)? {
                Ok(f) => CholeskyFactor::Sparse(f),
                Err(status) => return Ok(status),
            }
        } else {
            match dense_cholesky(a) {
                Some(chol) => CholeskyFactor::Dense(chol),
                None => {
                    warn!("Cholesky: {}x{} matrix is not positive definite", n, n);
                    return Ok(FactorStatus::NotPositiveDefinite);
                }
            }
        };
        if self.settings.verbose {
            info!("Cholesky factorization of {:?} {}x{} done", a.kind(), n, n);
        }
        self.n = n;
        self.factor = Some(factor);
        Ok(FactorStatus::Success)
    }

    fn solve(&self, rhs: &Matrix<'_>) -> Result<Matrix<'static>> {
        let factor = self.factor.as_ref().ok_or(MatrixError::NotFactorized)?;
        solve_columns(self.n, rhs, |x| {
            match factor {
                CholeskyFactor::Dense(chol) => {
                    let mut b = nalgebra::DVector::from_column_slice(x);
                    chol.solve_mut(&mut b);
                    x.copy_from_slice(b.as_slice());
                }
                CholeskyFactor::Sparse(f) => f.solve_in_place(x),
            }
            Ok(())
        })
    }

    fn is_factorized(&self) -> bool {
        self.factor.is_some()
    }

    fn dimension(&self) -> usize {
        self.n
    }
}
