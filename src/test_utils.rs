use rand::{rngs::StdRng, SeedableRng};

use crate::block::BlockMatrix;

pub const EPSILON: f64 = 1e-9; // Tolerance for floating point comparisons

pub fn assert_f64_eq(a: f64, b: f64, tol: f64) {
    assert!(
        (a - b).abs() < tol,
        "Assertion failed: {a} != {b} (within tolerance {tol})"
    );
}

/// Seeded `rows x cols` matrix with entries in `-1..1`.
pub fn random_block(rows: usize, cols: usize, block_len: usize, seed: u64) -> BlockMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    BlockMatrix::random(rows, cols, -1.0, 1.0, &mut rng, block_len).unwrap()
}
