//! Symmetric indefinite LDLᵀ solver.
//!
//! Dense kinds use the Bunch–Kaufman factorization in [`DenseLdl`]; Sparse
//! matrices go to the sparse backend through a [`SparseContext`]. The lower
//! triangle of the input is read; symmetry itself is not validated.

use log::info;

use crate::error::{MatrixError, Result};
use crate::matrix::{Data, Matrix};
use crate::settings::LinalgSettings;

use super::context::SparseContext;
use super::dense_ldl::DenseLdl;
use super::sparse_ldl::SparseLdlFactor;
use super::{check_factorizable, solve_columns, FactorStatus, FactoredSolver};

enum LdlFactor<'c> {
    Dense(DenseLdl),
    Sparse(SparseLdlFactor<'c>),
}

/// LDLᵀ solver over a private snapshot of the factorized matrix.
pub struct LdlFactorization<'c> {
    ctx: Option<&'c SparseContext>,
    settings: LinalgSettings,
    n: usize,
    factor: Option<LdlFactor<'c>>,
}

impl<'c> LdlFactorization<'c> {
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

    /// Nonzeros of the sparse `L` factor (strict part), if any.
    pub fn factor_nnz(&self) -> Option<usize> {
        match &self.factor {
            Some(LdlFactor::Sparse(f)) => Some(f.nnz_l()),
            _ => None,
        }
    }
}

impl<'c> FactoredSolver for LdlFactorization<'c> {
    fn factorize(&mut self, a: &Matrix<'_>) -> Result<FactorStatus> {
        let n = check_factorizable(a, self.factor.is_some())?;

        let result = match &a.data {
            Data::Sparse(s) => {
                let ctx = self.ctx.ok_or_else(|| {
                    MatrixError::invalid("sparse LDL needs a solver created with a SparseContext")
                })?;
                let upper = s.upper_triangle_with_diagonal();
                SparseLdlFactor::factor(ctx, &upper, self.settings.static_reg, self.settings.pivot_tol)
                    .map(LdlFactor::Sparse)
            }
            _ => DenseLdl::factor(a, self.settings.pivot_tol).map(LdlFactor::Dense),
        };

        let factor = match result {
            Ok(factor) => factor,
            Err(status) => return Ok(status),
        };
        if self.settings.verbose {
            match &factor {
                LdlFactor::Dense(f) => info!(
                    "LDL factorization of {}x{} dense matrix: {} 2x2 pivots",
                    n,
                    n,
                    f.two_by_two_pivots()
                ),
                LdlFactor::Sparse(f) => info!(
                    "LDL factorization of {}x{} sparse matrix: nnz(L) = {}",
                    n,
                    n,
                    f.nnz_l()
                ),
            }
        }
        self.n = n;
        self.factor = Some(factor);
        Ok(FactorStatus::Success)
    }

    fn solve(&self, rhs: &Matrix<'_>) -> Result<Matrix<'static>> {
        let factor = self.factor.as_ref().ok_or(MatrixError::NotFactorized)?;
        solve_columns(self.n, rhs, |x| {
            match factor {
                LdlFactor::Dense(f) => f.solve_in_place(x),
                LdlFactor::Sparse(f) => f.solve_in_place(x),
            }
            Ok(())
        })
    }

    fn is_factorized(&self) -> bool {
        self.factor.is_some()
    }

    fn dimension(&self) -> usize {
        match &self.factor {
            Some(LdlFactor::Sparse(f)) => f.dimension(),
            Some(LdlFactor::Dense(f)) => f.dimension(),
            None => self.n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixType, SparseSymmetry};

    fn indefinite() -> Matrix<'static> {
        // [[2, 1, 0], [1, -3, 2], [0, 2, 1]]
        Matrix::from_packed(3, MatrixType::Symmetric, vec![2.0, 1.0, 0.0, -3.0, 2.0, 1.0]).unwrap()
    }

    fn check_solution(a: &Matrix<'_>, x: &Matrix<'_>, b: &Matrix<'_>) {
        let r = a.multiply(x).unwrap().minus(b).unwrap();
        assert!(r.norm_fro() < 1e-10, "residual {}", r.norm_fro());
    }

    #[test]
    fn test_dense_indefinite() {
        let a = indefinite();
        let mut ldl = LdlFactorization::new(LinalgSettings::default());
        assert!(ldl.factorize(&a).unwrap().is_success());
        let b = Matrix::column(vec![1.0, 2.0, 3.0]);
        check_solution(&a, &ldl.solve(&b).unwrap(), &b);
    }

    #[test]
    fn test_sparse_matches_dense() {
        let a = indefinite();
        let mut triplets = Vec::new();
        a.for_each_stored(|i, j, v| {
            if i >= j && v != 0.0 {
                triplets.push((i, j, v));
            }
        });
        let s = Matrix::sparse_from_triplets(3, 3, triplets, SparseSymmetry::SymmetricLower).unwrap();

        let ctx = SparseContext::new(LinalgSettings::default()).unwrap();
        let mut sparse = LdlFactorization::with_context(&ctx);
        assert!(sparse.factorize(&s).unwrap().is_success());
        assert!(sparse.factor_nnz().is_some());

        let mut dense = LdlFactorization::new(LinalgSettings::default());
        dense.factorize(&a).unwrap();

        let b = Matrix::column(vec![-1.0, 0.5, 2.0]);
        let xs = sparse.solve(&b).unwrap();
        let xd = dense.solve(&b).unwrap();
        for (u, v) in xs.to_vec().iter().zip(xd.to_vec()) {
            assert!((u - v).abs() < 1e-12);
        }
        check_solution(&s, &xs, &b);
    }

    #[test]
    fn test_singular_is_status_not_error() {
        let a = Matrix::from_packed(2, MatrixType::Symmetric, vec![1.0, 2.0, 4.0]).unwrap();
        let mut ldl = LdlFactorization::new(LinalgSettings::default());
        assert_eq!(ldl.factorize(&a).unwrap(), FactorStatus::Singular);
        assert!(matches!(ldl.solve(&Matrix::column(vec![1.0, 1.0])), Err(MatrixError::NotFactorized)));
    }

    #[test]
    fn test_non_square_rejected() {
        let mut ldl = LdlFactorization::new(LinalgSettings::default());
        assert!(ldl.factorize(&Matrix::dense(2, 3)).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_static_reg_shifts_sparse_diagonal() {
        let settings = LinalgSettings {
            static_reg: 1.0,
            ..Default::default()
        };
        let ctx = SparseContext::new(settings).unwrap();
        let mut ldl = LdlFactorization::with_context(&ctx);
        let s = Matrix::sparse_from_triplets(
            2,
            2,
            vec![(0, 0, 1.0), (1, 1, 3.0)],
            SparseSymmetry::SymmetricLower,
        )
        .unwrap();
        ldl.factorize(&s).unwrap();
        // solves (A + I) x = b
        let x = ldl.solve(&Matrix::column(vec![2.0, 4.0])).unwrap();
        assert!((x.get(0, 0).unwrap() - 1.0).abs() < 1e-14);
        assert!((x.get(1, 0).unwrap() - 1.0).abs() < 1e-14);
    }
}
