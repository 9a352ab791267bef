//! Sparse LDLᵀ through the `ldl` crate.
//!
//! The backend takes the upper triangle of a symmetric matrix in CSC form and
//! produces a unit lower-triangular `L` (strict part, CSC) and a diagonal `D`
//! such that `A = L D Lᵀ`. No fill-reducing ordering is applied.

use std::mem::size_of;

use log::{debug, warn};

use crate::matrix::sparse::{self, SparseCsc};

use super::context::SparseContext;
use super::FactorStatus;

/// Status recorded in the context when the elimination tree cannot be built.
pub(crate) const STATUS_BAD_STRUCTURE: i32 = -1;
/// Status recorded in the context when the numeric factorization hits a zero pivot.
pub(crate) const STATUS_ZERO_PIVOT: i32 = -2;

/// Numeric factor owned by a solver. Its memory is accounted in the context
/// until it is dropped.
pub(crate) struct SparseLdlFactor<'c> {
    ctx: &'c SparseContext,
    n: usize,
    /// L column pointers
    l_p: Vec<usize>,
    /// L row indices
    l_i: Vec<usize>,
    /// L values (strictly lower, unit diagonal implied)
    l_x: Vec<f64>,
    d: Vec<f64>,
    d_inv: Vec<f64>,
}

impl<'c> SparseLdlFactor<'c> {
    /// Symbolic and numeric factorization of `upper` (upper triangle with
    /// every diagonal entry present) plus `static_reg` on the diagonal.
    ///
    /// Pivots with magnitude at or below `pivot_tol` fail with `Singular`.
    pub(crate) fn factor(
        ctx: &'c SparseContext,
        upper: &SparseCsc,
        static_reg: f64,
        pivot_tol: f64,
    ) -> Result<Self, FactorStatus> {
        let n = upper.cols();

        // Keep indptr alive
        let indptr = upper.indptr();
        let a_p = indptr.raw_storage();
        let a_i = upper.indices();

        let mut a_x = upper.data().to_vec();
        if static_reg > 0.0 {
            for col in 0..n {
                for idx in a_p[col]..a_p[col + 1] {
                    if a_i[idx] == col {
                        a_x[idx] += static_reg;
                        break;
                    }
                }
            }
        }

        let mut work = vec![0; n];
        let mut l_nz = vec![0; n];
        let mut etree = vec![None; n];
        if ldl::etree(n, a_p, a_i, &mut work, &mut l_nz, &mut etree).is_err() {
            warn!("sparse LDL: elimination tree failed for n = {}", n);
            ctx.set_status(STATUS_BAD_STRUCTURE);
            return Err(FactorStatus::External(STATUS_BAD_STRUCTURE));
        }

        // Fill-in can make L larger than A
        let nnz_l: usize = l_nz.iter().sum();
        debug!("sparse LDL: n = {}, nnz(A) = {}, nnz(L) = {}", n, a_x.len(), nnz_l);

        let mut l_p = vec![0; n + 1];
        let mut l_i = vec![0; nnz_l];
        let mut l_x = vec![0.0; nnz_l];
        let mut d = vec![0.0; n];
        let mut d_inv = vec![0.0; n];

        let result = ctx.with_workspace(n, |ws| {
            ldl::factor(
                n,
                a_p,
                a_i,
                &a_x,
                &mut l_p,
                &mut l_i,
                &mut l_x,
                &mut d,
                &mut d_inv,
                &l_nz,
                &etree,
                &mut ws.bwork[..n],
                &mut ws.iwork[..3 * n],
                &mut ws.fwork[..n],
            )
        });
        if result.is_err() {
            warn!("sparse LDL: zero pivot during numeric factorization");
            ctx.set_status(STATUS_ZERO_PIVOT);
            return Err(FactorStatus::Singular);
        }
        ctx.set_status(0);

        if let Some(k) = d.iter().position(|dk| dk.abs() <= pivot_tol) {
            warn!("sparse LDL: pivot {} = {:e} below tolerance", k, d[k]);
            return Err(FactorStatus::Singular);
        }

        let factor = Self {
            ctx,
            n,
            l_p,
            l_i,
            l_x,
            d,
            d_inv,
        };
        ctx.track_factor(factor.bytes());
        Ok(factor)
    }

    fn bytes(&self) -> usize {
        (self.l_p.len() + self.l_i.len()) * size_of::<usize>()
            + (self.l_x.len() + self.d.len() + self.d_inv.len()) * size_of::<f64>()
    }

    pub(crate) fn dimension(&self) -> usize {
        self.n
    }

    pub(crate) fn nnz_l(&self) -> usize {
        self.l_x.len()
    }

    pub(crate) fn d(&self) -> &[f64] {
        &self.d
    }

    /// Solve `L D Lᵀ x = b` in place.
    pub(crate) fn solve_in_place(&self, x: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n);
        ldl::solve(self.n, &self.l_p, &self.l_i, &self.l_x, &self.d_inv, x);
    }

    /// Cholesky factor `L·sqrt(D)` as a lower-triangular CSC matrix.
    ///
    /// Only meaningful when every pivot is positive.
    pub(crate) fn cholesky_factor(&self) -> SparseCsc {
        let mut triplets = Vec::with_capacity(self.n + self.l_x.len());
        for j in 0..self.n {
            let s = self.d[j].sqrt();
            triplets.push((j, j, s));
            for idx in self.l_p[j]..self.l_p[j + 1] {
                triplets.push((self.l_i[idx], j, self.l_x[idx] * s));
            }
        }
        sparse::from_triplets(self.n, self.n, triplets)
    }
}

impl Drop for SparseLdlFactor<'_> {
    fn drop(&mut self) {
        self.ctx.untrack_factor(self.bytes());
    }
}
