//! Integration tests for the matrix value type and the dispatch table.

use forbes_core::dispatch::{add_result_kind, mul_result_kind};
use forbes_core::factory::{make_identity, make_random_matrix, read_sparse, shallow_vector};
use forbes_core::operator::{LinearOperator, MatOp};
use forbes_core::{Matrix, MatrixError, MatrixType, SparseSymmetry};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

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

fn close(a: &[f64], b: &[f64], tol: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= tol * (1.0 + y.abs()))
}

#[test]
fn test_random_pairs_follow_the_table() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for ka in MatrixType::ALL {
        for kb in MatrixType::ALL {
            for transpose_a in [false, true] {
                let mut a = make_random_matrix(&mut rng, 5, 5, -1.0, 2.0, ka).unwrap();
                let b = make_random_matrix(&mut rng, 5, 5, -1.0, 2.0, kb).unwrap();
                if transpose_a {
                    a.transpose();
                }

                let sum = &a + &b;
                assert_eq!(sum.kind(), add_result_kind(ka, kb));
                assert_eq!(add_result_kind(ka, kb), add_result_kind(kb, ka));
                let expected: Vec<f64> = a.to_vec().iter().zip(b.to_vec()).map(|(x, y)| x + y).collect();
                assert!(close(&sum.to_vec(), &expected, 1e-12), "{:?} + {:?}", ka, kb);

                let prod = &a * &b;
                if !transpose_a {
                    assert_eq!(prod.kind(), mul_result_kind(ka, kb));
                }
                assert!(
                    close(&prod.to_vec(), &reference_product(&a, &b), 1e-8),
                    "{:?}{} * {:?}",
                    ka,
                    if transpose_a { "'" } else { "" },
                    kb
                );
            }
        }
    }
}

#[test]
fn test_quad_matches_definition() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    for kind in MatrixType::ALL {
        let a = make_random_matrix(&mut rng, 6, 6, -1.0, 2.0, kind).unwrap();
        let xs: Vec<f64> = (0..6).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let q: Vec<f64> = (0..6).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let x = Matrix::column(xs.clone());
        let qm = Matrix::column(q.clone());

        let mut expected = 0.0;
        for i in 0..6 {
            for j in 0..6 {
                expected += xs[i] * xs[j] * a.get(i, j).unwrap();
            }
        }
        expected *= 0.5;
        let got = a.quad(&x).unwrap();
        assert!((got - expected).abs() < 1e-10, "{:?}", kind);

        let linear: f64 = xs.iter().zip(&q).map(|(u, v)| u * v).sum();
        assert!((a.quad_linear(&x, &qm).unwrap() - (got + linear)).abs() < 1e-12);
    }
}

#[test]
fn test_transpose_twice_for_all_kinds() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for kind in MatrixType::ALL {
        let a = make_random_matrix(&mut rng, 4, 4, 0.0, 1.0, kind).unwrap();
        let mut b = a.clone();
        b.transpose();
        b.transpose();
        assert_eq!(a, b);
    }
}

#[test]
fn test_mismatch_never_partially_writes() {
    let mut a = Matrix::from_column_major(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let wrong = Matrix::dense(3, 2);
    let before = a.clone();
    assert!(a.plus_assign(&wrong).unwrap_err().is_invalid_argument());
    assert!(a.multiply(&Matrix::dense(3, 1)).unwrap_err().is_invalid_argument());
    assert_eq!(a, before);
}

#[test]
fn test_views_alias_their_parent() {
    let mut parent = Matrix::column(vec![0.0; 6]);
    {
        let mut tail = Matrix::shallow_vector_mut(&mut parent, 2, Some(3)).unwrap();
        tail.plus_assign(&Matrix::column(vec![1.0, 2.0, 3.0])).unwrap();
        tail *= 2.0;
    }
    assert_eq!(parent.to_vec(), vec![0.0, 0.0, 2.0, 4.0, 6.0, 0.0]);

    let view = shallow_vector(&parent, 2, None).unwrap();
    assert!(view.is_view());
    assert_eq!(view.rows(), 4);
    let copy = view.clone();
    assert!(!copy.is_view());
    assert!(matches!(
        shallow_vector(&make_identity(3, 1.0), 0, None),
        Err(MatrixError::InvalidArgument(_))
    ));
}

#[test]
fn test_loaded_sparse_matrix_as_operator() {
    let text = "# 3x3 symmetric\n3 3 4\n0 0 2\n1 0 -1\n1 1 2\n2 2 1\n";
    let a = read_sparse(text.as_bytes(), SparseSymmetry::SymmetricLower).unwrap();
    assert_eq!(a.symmetry(), Some(SparseSymmetry::SymmetricLower));
    let op = MatOp::new(&a);
    let y = op.call(&[1.0, 1.0, 1.0]).unwrap();
    assert_eq!(y, vec![1.0, 1.0, 1.0]);
    assert_eq!(op.call_adjoint(&[1.0, 1.0, 1.0]).unwrap(), y);

    let mut acc = vec![1.0, 1.0, 1.0];
    op.call_scaled(&mut acc, -1.0, &[1.0, 0.0, 0.0], 2.0).unwrap();
    assert_eq!(acc, vec![0.0, 3.0, 2.0]);
}

#[test]
fn test_reshape_failures_are_distinguishable() {
    let mut a = Matrix::dense(2, 3);
    assert!(matches!(a.reshape(4, 2), Err(MatrixError::ReshapeSize { .. })));
    let mut s = Matrix::sparse(2, 3, 0, SparseSymmetry::Unsymmetric);
    assert!(matches!(s.reshape(3, 2), Err(MatrixError::UnsupportedKind { .. })));
    a.reshape(6, 1).unwrap();
    assert!(a.is_column_vector());
}
