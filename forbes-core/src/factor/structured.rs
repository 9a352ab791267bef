//! Solver for `(I + β·X·Xᵀ)·x = b`.
//!
//! With `X` of size `n x k` and `k < n`, the solver factors the small
//! `k x k` capacitance matrix `M = I + β·Xᵀ·X` and applies the Woodbury
//! identity
//!
//! ```text
//! (I + β X Xᵀ)⁻¹ b = b - β X M⁻¹ Xᵀ b
//! ```
//!
//! so neither the factorization nor a solve touches an `n x n` matrix. When
//! `k >= n` the `n x n` system is formed and factorized directly. Both small
//! systems may be indefinite (negative `β`) and use the Bunch–Kaufman LDLᵀ.

use log::{debug, info};

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::settings::LinalgSettings;

use super::dense_ldl::DenseLdl;
use super::{solve_columns, FactorStatus, FactoredSolver};

#[derive(Debug)]
enum Reduction {
    /// `X` (column-major `n x k`) and the factor of `I_k + β XᵀX`
    Woodbury { x: Vec<f64>, k: usize, m: DenseLdl },
    /// Factor of `I_n + β X Xᵀ`
    Direct(DenseLdl),
}

/// Structured solver for identity-plus-low-rank systems.
#[derive(Debug)]
pub struct SLdlFactorization {
    beta: f64,
    settings: LinalgSettings,
    n: usize,
    reduction: Option<Reduction>,
}

impl SLdlFactorization {
    pub fn new(beta: f64) -> Self {
        Self::with_settings(beta, LinalgSettings::default())
    }

    pub fn with_settings(beta: f64, settings: LinalgSettings) -> Self {
        Self {
            beta,
            settings,
            n: 0,
            reduction: None,
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Order of the system actually factorized (`min(n, k)`).
    pub fn reduced_dimension(&self) -> Option<usize> {
        self.reduction.as_ref().map(|r| match r {
            Reduction::Woodbury { k, .. } => *k,
            Reduction::Direct(f) => f.dimension(),
        })
    }
}

/// `I + β G` where `G` is the Gram matrix built by `gram(i, j)`.
fn identity_plus(order: usize, beta: f64, gram: impl Fn(usize, usize) -> f64) -> Vec<f64> {
    let mut w = vec![0.0; order * order];
    for j in 0..order {
        for i in j..order {
            let mut v = beta * gram(i, j);
            if i == j {
                v += 1.0;
            }
            w[i + j * order] = v;
            w[j + i * order] = v;
        }
    }
    w
}

impl FactoredSolver for SLdlFactorization {
    /// Factorize for the tall or wide factor `X`; the system order is `X.rows()`.
    fn factorize(&mut self, x: &Matrix<'_>) -> Result<FactorStatus> {
        if self.reduction.is_some() {
            return Err(MatrixError::AlreadyFactorized);
        }
        if !self.beta.is_finite() {
            return Err(MatrixError::invalid(format!("beta must be finite, got {}", self.beta)));
        }
        let (n, k) = x.shape();
        let values = x.to_vec();
        let col = |j: usize| &values[j * n..(j + 1) * n];
        let pivot_tol = self.settings.pivot_tol;

        let reduction = if k < n {
            debug!("structured LDL: Woodbury reduction {}x{} -> {}x{}", n, n, k, k);
            let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(u, v)| u * v).sum::<f64>();
            let w = identity_plus(k, self.beta, |i, j| dot(col(i), col(j)));
            match DenseLdl::factor_full(k, w, pivot_tol) {
                Ok(m) => Reduction::Woodbury { x: values, k, m },
                Err(status) => return Ok(status),
            }
        } else {
            debug!("structured LDL: forming {}x{} system directly", n, n);
            let w = identity_plus(n, self.beta, |i, j| {
                (0..k).map(|p| values[i + p * n] * values[j + p * n]).sum::<f64>()
            });
            match DenseLdl::factor_full(n, w, pivot_tol) {
                Ok(f) => Reduction::Direct(f),
                Err(status) => return Ok(status),
            }
        };
        if self.settings.verbose {
            info!("structured LDL factorization: n = {}, rank = {}", n, k);
        }
        self.n = n;
        self.reduction = Some(reduction);
        Ok(FactorStatus::Success)
    }

    fn solve(&self, rhs: &Matrix<'_>) -> Result<Matrix<'static>> {
        let reduction = self.reduction.as_ref().ok_or(MatrixError::NotFactorized)?;
        let n = self.n;
        solve_columns(n, rhs, |b| {
            match reduction {
                Reduction::Direct(f) => f.solve_in_place(b),
                Reduction::Woodbury { x, k, m } => {
                    // t = M⁻¹ Xᵀ b
                    let mut t: Vec<f64> = x
                        .chunks(n)
                        .take(*k)
                        .map(|c| c.iter().zip(b.iter()).map(|(u, v)| u * v).sum())
                        .collect();
                    m.solve_in_place(&mut t);
                    // b -= β X t
                    for (c, tj) in x.chunks(n).zip(&t) {
                        let s = self.beta * tj;
                        for (bi, xi) in b.iter_mut().zip(c) {
                            *bi -= s * xi;
                        }
                    }
                }
            }
            Ok(())
        })
    }

    fn is_factorized(&self) -> bool {
        self.reduction.is_some()
    }

    fn dimension(&self) -> usize {
        self.n
    }
}
