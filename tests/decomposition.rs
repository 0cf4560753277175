mod common;

use blockqr::block::{Submatrix, SubmatrixMut};
use blockqr::linalg::wy::apply_wy_transpose;
use blockqr::{BlockMatrix, BlockQr, BlockQrError, BlockQrOptions};
use common::{assert_matrix_close, householder_qr, random_array};
use ndarray::Array2;

const TOL: f64 = 1e-8;

fn decompose(a: &Array2<f64>, r: usize, parallel: bool) -> BlockQr<f64> {
    let ab = BlockMatrix::from_array2(a, r).unwrap();
    BlockQr::decompose_with(ab, BlockQrOptions { parallel }).unwrap()
}

#[test]
fn test_packed_result_matches_unblocked_reference() {
    // tall, square and wide, with and without edge tiles
    let shapes = [(9, 9, 3), (11, 7, 3), (20, 6, 4), (7, 11, 3), (5, 13, 2), (16, 16, 4), (1, 4, 2), (4, 1, 2)];
    for (seed, &(m, n, r)) in shapes.iter().enumerate() {
        let a = random_array(m, n, seed as u64 + 100);
        let (expected, expected_gammas) = householder_qr(&a);
        let qr = decompose(&a, r, false);

        assert_matrix_close(&qr.qr().to_array2(), &expected, TOL);
        for (j, (g, e)) in qr.gammas().iter().zip(&expected_gammas).enumerate() {
            assert!((g - e).abs() < TOL, "{m}x{n}, r = {r}: gamma {j}: {g} != {e}");
        }
    }
}

#[test]
fn test_q_times_r_reconstructs_input() {
    for &(m, n, r) in &[(25, 17, 4), (17, 25, 4), (30, 30, 7)] {
        let a = random_array(m, n, (m * n) as u64);
        let qr = decompose(&a, r, true);

        let q = qr.q(true).unwrap().to_array2();
        let r_factor = qr.r(true).unwrap().to_array2();
        assert_matrix_close(&q.dot(&r_factor), &a, TOL);

        let q_full = qr.q(false).unwrap().to_array2();
        let r_full = qr.r(false).unwrap().to_array2();
        assert_matrix_close(&q_full.dot(&r_full), &a, TOL);
    }
}

#[test]
fn test_q_is_orthogonal() {
    let a = random_array(31, 19, 5);
    let qr = decompose(&a, 6, true);
    let q = qr.q(false).unwrap().to_array2();
    assert_matrix_close(&q.t().dot(&q), &Array2::eye(31), TOL);
    assert_matrix_close(&q.dot(&q.t()), &Array2::eye(31), TOL);
}

#[test]
fn test_parallel_and_sequential_agree() {
    // Large enough for the trailing updates to cross the parallel threshold.
    let a = random_array(300, 200, 77);
    let serial = decompose(&a, 16, false);
    let parallel = decompose(&a, 16, true);

    let diff = serial.qr().max_abs_diff(parallel.qr()).unwrap();
    assert!(diff < 1e-10, "packed results differ by {diff}");
    for (s, p) in serial.gammas().iter().zip(parallel.gammas()) {
        assert!((s - p).abs() < 1e-12);
    }
}

#[test]
fn test_default_block_length() {
    let a = random_array(130, 70, 3);
    let (expected, _) = householder_qr(&a);
    let ab = BlockMatrix::from_array2(&a, blockqr::DEFAULT_BLOCK_LEN).unwrap();
    let qr = BlockQr::decompose(ab).unwrap();
    assert_matrix_close(&qr.qr().to_array2(), &expected, TOL);
}

#[test]
fn test_rank_deficient_input() {
    // second column is a multiple of the first
    let mut a = random_array(6, 3, 17);
    for i in 0..6 {
        a[[i, 1]] = 2.0 * a[[i, 0]];
    }
    let qr = decompose(&a, 2, false);
    let q = qr.q(true).unwrap().to_array2();
    let r = qr.r(true).unwrap().to_array2();
    assert_matrix_close(&q.dot(&r), &a, TOL);
    assert_matrix_close(&q.t().dot(&q), &Array2::eye(3), TOL);
    assert!(r[[1, 1]].abs() < 1e-12);
}

#[test]
fn test_zero_matrix() {
    let a = Array2::<f64>::zeros((5, 4));
    let qr = decompose(&a, 2, true);
    assert!(qr.gammas().iter().all(|&g| g == 0.0));
    assert_matrix_close(&qr.q(false).unwrap().to_array2(), &Array2::eye(5), 1e-15);
}

#[test]
fn test_invalid_views_are_errors() {
    let mut a = BlockMatrix::<f64>::new(6, 4, 3).unwrap();
    assert!(matches!(
        Submatrix::new(&a, 0, 7, 0, 4),
        Err(BlockQrError::InvalidBounds { .. })
    ));
    assert!(matches!(
        SubmatrixMut::new(&mut a, 4, 2, 0, 1),
        Err(BlockQrError::InvalidBounds { .. })
    ));

    let y = BlockMatrix::<f64>::identity(6, 2, 3).unwrap();
    let w = BlockMatrix::<f64>::new(5, 2, 3).unwrap();
    let result = apply_wy_transpose(
        &Submatrix::full(&y),
        &Submatrix::full(&w),
        &mut SubmatrixMut::full(&mut a),
    );
    assert!(matches!(result, Err(BlockQrError::DimensionMismatch { .. })));
}
