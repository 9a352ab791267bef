//! Forbes: a typed matrix-algebra engine for convex optimization.
//!
//! The crate provides:
//!
//! - **[`Matrix`]**: one value type over five storage kinds (dense, sparse,
//!   diagonal, packed symmetric and packed lower-triangular), with O(1)
//!   transposition and borrowed shallow views
//! - **Dispatch**: a single 5×5 table that fixes the result kind of every
//!   binary operation, plus the per-pair algorithms
//! - **Factorizations**: Cholesky, symmetric indefinite LDLᵀ (dense
//!   Bunch–Kaufman and sparse) and a Woodbury-style solver for
//!   `(I + β·X·Xᵀ)·x = b`
//!
//! # Example
//!
//! ```
//! use forbes_core::{factor::{FactoredSolver, LdlFactorization}, Matrix, MatrixType};
//!
//! let mut a = Matrix::zeros(2, 2, MatrixType::Symmetric).unwrap();
//! a.set(0, 0, 4.0).unwrap();
//! a.set(1, 0, 1.0).unwrap();
//! a.set(1, 1, 3.0).unwrap();
//!
//! let mut ldl = LdlFactorization::new(Default::default());
//! assert!(ldl.factorize(&a).unwrap().is_success());
//! let x = ldl.solve(&Matrix::column(vec![1.0, 2.0])).unwrap();
//! let r = a.multiply(&x).unwrap();
//! assert!((r.get(1, 0).unwrap() - 2.0).abs() < 1e-12);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod error;
pub mod factor;
pub mod factory;
pub mod matrix;
pub mod operator;
pub mod settings;

pub use error::{MatrixError, Result};
pub use factor::{FactorStatus, FactoredSolver, SparseContext};
pub use matrix::{Matrix, MatrixType, SparseSymmetry};
pub use settings::LinalgSettings;
