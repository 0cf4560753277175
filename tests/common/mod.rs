#![allow(dead_code)]

use blockqr::BlockMatrix;
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, SeedableRng};

/// Seeded dense matrix with entries in `-1..1`.
pub fn random_array(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    BlockMatrix::random(rows, cols, -1.0, 1.0, &mut rng, 1)
        .unwrap()
        .to_array2()
}

/// Unblocked Householder QR on a dense matrix, one column at a time.
///
/// Returns the packed result (`R` on and above the diagonal, reflectors with
/// an implicit leading 1 below it) and one coefficient per column.
pub fn householder_qr(a: &Array2<f64>) -> (Array2<f64>, Vec<f64>) {
    let mut qr = a.clone();
    let (m, n) = qr.dim();
    let mut gammas = vec![0.0; n];

    for j in 0..m.min(n) {
        if (j + 1..m).all(|i| qr[[i, j]] == 0.0) {
            continue;
        }
        let max = (j..m).map(|i| qr[[i, j]].abs()).fold(0.0, f64::max);

        let mut tau = 0.0;
        for i in j..m {
            qr[[i, j]] /= max;
            tau += qr[[i, j]] * qr[[i, j]];
        }
        let mut tau = f64::sqrt(tau);
        if qr[[j, j]] < 0.0 {
            tau = -tau;
        }
        let u_0 = qr[[j, j]] + tau;
        let gamma = u_0 / tau;
        for i in j + 1..m {
            qr[[i, j]] /= u_0;
        }
        qr[[j, j]] = -tau * max;
        gammas[j] = gamma;

        for c in j + 1..n {
            let mut dot = qr[[j, c]];
            for i in j + 1..m {
                dot += qr[[i, j]] * qr[[i, c]];
            }
            qr[[j, c]] -= gamma * dot;
            for i in j + 1..m {
                qr[[i, c]] -= gamma * dot * qr[[i, j]];
            }
        }
    }
    (qr, gammas)
}

/// Reflector `j` of a packed result as an explicit vector.
pub fn reflector(qr: &Array2<f64>, j: usize) -> Array1<f64> {
    Array1::from_shape_fn(qr.nrows(), |i| {
        if i < j {
            0.0
        } else if i == j {
            1.0
        } else {
            qr[[i, j]]
        }
    })
}

/// `x <- (I - gamma * v * vᵗ) * x`
pub fn apply_reflector(v: &Array1<f64>, gamma: f64, x: &mut Array1<f64>) {
    let dot = v.dot(&*x);
    x.scaled_add(-gamma * dot, v);
}

pub fn assert_matrix_close(found: &Array2<f64>, expected: &Array2<f64>, tol: f64) {
    assert_eq!(found.dim(), expected.dim(), "shape mismatch");
    for ((i, j), &e) in expected.indexed_iter() {
        let f = found[[i, j]];
        assert!(
            (f - e).abs() < tol,
            "element ({i}, {j}): {f} != {e} (within tolerance {tol})"
        );
    }
}
