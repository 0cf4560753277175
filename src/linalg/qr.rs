//! Blocked Householder QR driver.
//!
//! The matrix is swept one tile-column (panel) at a time. Each panel is
//! factored with unblocked reflections, its reflectors are folded into a
//! compact WY factor, and the panel's `Qᵗ` is applied to everything right of
//! it with two block products. The factored matrix holds `R` on and above
//! the diagonal and the reflector vectors below it.

use std::cmp::min;

use num::Float;

use crate::block::{BlockMatrix, Submatrix, SubmatrixMut};
use crate::error::{dimension_error, Result};
use crate::linalg::householder::decompose_qr_block_col;
use crate::linalg::wy::{apply_wy, apply_wy_transpose, par_apply_wy, par_apply_wy_transpose, CompactWy};
use crate::PARALLEL_THRESHOLD;

/// Runtime knobs for the decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockQrOptions {
    /// Split block WY products across tile rows with Rayon once the target
    /// has at least [`PARALLEL_THRESHOLD`] elements.
    pub parallel: bool,
}

impl Default for BlockQrOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl BlockQrOptions {
    fn parallel_for(&self, rows: usize, cols: usize) -> bool {
        self.parallel && rows * cols >= PARALLEL_THRESHOLD
    }
}

/// Copies panel `j..j + width` out of `qr` and builds its W factor.
///
/// Returns `(Y, W)`, both starting at row `j` of `qr`.
fn panel_wy<T: Float>(
    qr: &BlockMatrix<T>,
    gammas: &[T],
    j: usize,
    width: usize,
) -> Result<(BlockMatrix<T>, BlockMatrix<T>)> {
    let m = qr.rows();
    let k = min(width, m - j);
    let y = Submatrix::new(qr, j, m, j, j + width)?.to_block_matrix()?;
    let mut w = BlockMatrix::new(m - j, k, qr.block_len())?;
    CompactWy::build(SubmatrixMut::full(&mut w), &Submatrix::full(&y), &gammas[j..j + k]);
    Ok((y, w))
}

/// Factors `a` in place with the default options.
///
/// `gammas` receives one reflector coefficient per column and must be at
/// least `a.cols()` long.
pub fn decompose_in_place<T>(a: &mut BlockMatrix<T>, gammas: &mut [T]) -> Result<()>
where
    T: Float + Send + Sync,
{
    decompose_in_place_with(a, gammas, BlockQrOptions::default())
}

/// Factors `a` in place.
pub fn decompose_in_place_with<T>(
    a: &mut BlockMatrix<T>,
    gammas: &mut [T],
    options: BlockQrOptions,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    let (m, n, r) = (a.rows(), a.cols(), a.block_len());
    if gammas.len() < n {
        return Err(dimension_error(
            n,
            gammas.len(),
            "need one reflector coefficient per column",
        ));
    }
    let steps = min(m, n);
    log::debug!(
        "block QR of a {m}x{n} matrix, block length {r}, {} panels, parallel: {}",
        steps.div_ceil(r),
        options.parallel
    );

    for j in (0..steps).step_by(r) {
        let width = min(r, n - j);
        log::trace!("panel at column {j}, width {width}");
        decompose_qr_block_col(&mut SubmatrixMut::new(a, j, m, j, j + width)?, gammas)?;

        if j + width < n {
            let (y, w) = panel_wy(a, gammas, j, width)?;
            let (y, w) = (Submatrix::full(&y), Submatrix::full(&w));
            let mut trailing = SubmatrixMut::new(a, j, m, j + width, n)?;
            if options.parallel_for(m - j, n - j - width) {
                par_apply_wy_transpose(&y, &w, &mut trailing)?;
            } else {
                apply_wy_transpose(&y, &w, &mut trailing)?;
            }
        }
    }

    log::debug!("block QR of a {m}x{n} matrix finished");
    Ok(())
}

/// A QR decomposition computed with blocked Householder reflections.
///
/// # Examples
///
/// ```
/// use blockqr::{BlockMatrix, BlockQr};
///
/// let a = BlockMatrix::from_fn(5, 3, 2, |i, j| (i * 3 + j) as f64 + if i == j { 4.0 } else { 0.0 })?;
/// let qr = BlockQr::decompose(a.clone())?;
/// let q = qr.q(true)?;
/// let r = qr.r(true)?;
/// let back = BlockMatrix::from_array2(&q.to_array2().dot(&r.to_array2()), 2)?;
/// assert!(back.max_abs_diff(&a).unwrap() < 1e-10);
/// # Ok::<(), blockqr::BlockQrError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BlockQr<T> {
    qr: BlockMatrix<T>,
    gammas: Vec<T>,
    options: BlockQrOptions,
}

impl<T> BlockQr<T>
where
    T: Float + Send + Sync,
{
    /// Factors `a` with the default options.
    pub fn decompose(a: BlockMatrix<T>) -> Result<Self> {
        Self::decompose_with(a, BlockQrOptions::default())
    }

    pub fn decompose_with(mut a: BlockMatrix<T>, options: BlockQrOptions) -> Result<Self> {
        let mut gammas = vec![T::zero(); a.cols()];
        decompose_in_place_with(&mut a, &mut gammas, options)?;
        Ok(Self {
            qr: a,
            gammas,
            options,
        })
    }

    /// The packed factorization: `R` on and above the diagonal, reflectors below.
    #[inline]
    pub fn qr(&self) -> &BlockMatrix<T> {
        &self.qr
    }

    /// Reflector coefficients, one per column.
    #[inline]
    pub fn gammas(&self) -> &[T] {
        &self.gammas
    }

    #[inline]
    pub fn options(&self) -> BlockQrOptions {
        self.options
    }

    pub fn into_parts(self) -> (BlockMatrix<T>, Vec<T>) {
        (self.qr, self.gammas)
    }

    /// Upper-triangular factor. With `compact` it is `min(m, n) x n`,
    /// otherwise `m x n` with zero rows at the bottom.
    pub fn r(&self, compact: bool) -> Result<BlockMatrix<T>> {
        let (m, n) = (self.qr.rows(), self.qr.cols());
        let rows = if compact { min(m, n) } else { m };
        BlockMatrix::from_fn(rows, n, self.qr.block_len(), |i, j| {
            if i <= j {
                self.qr.get(i, j)
            } else {
                T::zero()
            }
        })
    }

    /// Orthogonal factor. With `compact` it is `m x min(m, n)`, otherwise `m x m`.
    pub fn q(&self, compact: bool) -> Result<BlockMatrix<T>> {
        let (m, n) = (self.qr.rows(), self.qr.cols());
        let cols = if compact { min(m, n) } else { m };
        let mut q = BlockMatrix::identity(m, cols, self.qr.block_len())?;
        self.apply_q(&mut q)?;
        Ok(q)
    }

    /// `B <- Q * B`. `b` must have as many rows as the factored matrix.
    pub fn apply_q(&self, b: &mut BlockMatrix<T>) -> Result<()> {
        self.check_rows(b)?;
        let panels: Vec<usize> = self.panel_starts().collect();
        for &j in panels.iter().rev() {
            self.apply_panel(j, b, false)?;
        }
        Ok(())
    }

    /// `B <- Qᵗ * B`. `b` must have as many rows as the factored matrix.
    pub fn apply_q_transpose(&self, b: &mut BlockMatrix<T>) -> Result<()> {
        self.check_rows(b)?;
        for j in self.panel_starts() {
            self.apply_panel(j, b, true)?;
        }
        Ok(())
    }

    fn panel_starts(&self) -> impl Iterator<Item = usize> {
        let steps = min(self.qr.rows(), self.qr.cols());
        (0..steps).step_by(self.qr.block_len())
    }

    fn check_rows(&self, b: &BlockMatrix<T>) -> Result<()> {
        if b.rows() != self.qr.rows() {
            return Err(dimension_error(
                self.qr.rows(),
                b.rows(),
                "operand must have as many rows as the factored matrix",
            ));
        }
        Ok(())
    }

    fn apply_panel(&self, j: usize, b: &mut BlockMatrix<T>, transpose: bool) -> Result<()> {
        let (m, n) = (self.qr.rows(), self.qr.cols());
        let width = min(self.qr.block_len(), n - j);
        let (y, w) = panel_wy(&self.qr, &self.gammas, j, width)?;
        let (y, w) = (Submatrix::full(&y), Submatrix::full(&w));
        let cols = b.cols();
        let mut target = SubmatrixMut::new(b, j, m, 0, cols)?;
        match (transpose, self.options.parallel_for(m - j, cols)) {
            (true, true) => par_apply_wy_transpose(&y, &w, &mut target),
            (true, false) => apply_wy_transpose(&y, &w, &mut target),
            (false, true) => par_apply_wy(&y, &w, &mut target),
            (false, false) => apply_wy(&y, &w, &mut target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockQrError;
    use crate::test_utils::{assert_f64_eq, random_block, EPSILON};

    #[test]
    fn test_default_options_are_parallel() {
        assert!(BlockQrOptions::default().parallel);
        let serial = BlockQrOptions { parallel: false };
        assert!(!serial.parallel_for(1 << 20, 1 << 20));
    }

    #[test]
    fn test_empty_matrices_factor_trivially() {
        for (m, n) in [(0, 0), (0, 4), (4, 0)] {
            let qr = BlockQr::decompose(BlockMatrix::<f64>::new(m, n, 3).unwrap()).unwrap();
            assert_eq!(qr.gammas().len(), n);
            assert_eq!(qr.q(false).unwrap().rows(), m);
        }
    }

    #[test]
    fn test_single_element() {
        let a = BlockMatrix::from_fn(1, 1, 2, |_, _| -2.0).unwrap();
        let qr = BlockQr::decompose(a).unwrap();
        assert_eq!(qr.gammas(), &[0.0]);
        assert_eq!(qr.qr().get(0, 0), -2.0);
        assert_eq!(qr.q(false).unwrap().get(0, 0), 1.0);
    }

    #[test]
    fn test_short_gammas_is_an_error() {
        let mut a = random_block(6, 4, 2, 5);
        let mut gammas = vec![0.0; 3];
        let err = decompose_in_place(&mut a, &mut gammas).unwrap_err();
        assert!(matches!(err, BlockQrError::DimensionMismatch { expected: 4, found: 3, .. }));
    }

    #[test]
    fn test_r_is_upper_triangular() {
        let qr = BlockQr::decompose(random_block(7, 5, 3, 9)).unwrap();
        let full = qr.r(false).unwrap();
        let compact = qr.r(true).unwrap();
        assert_eq!((full.rows(), full.cols()), (7, 5));
        assert_eq!((compact.rows(), compact.cols()), (5, 5));
        for i in 0..7 {
            for j in 0..i.min(5) {
                assert_eq!(full.get(i, j), 0.0);
            }
        }
        for j in 0..5 {
            assert_eq!(compact.get(0, j), qr.qr().get(0, j));
        }
    }

    #[test]
    fn test_apply_q_then_transpose_restores_operand() {
        let qr = BlockQr::decompose(random_block(8, 6, 3, 13)).unwrap();
        let orig = random_block(8, 4, 2, 14);
        let mut b = orig.clone();
        qr.apply_q(&mut b).unwrap();
        qr.apply_q_transpose(&mut b).unwrap();
        assert!(b.max_abs_diff(&orig).unwrap() < EPSILON);
    }

    #[test]
    fn test_apply_q_transpose_gives_r() {
        let a = random_block(9, 5, 2, 21);
        let qr = BlockQr::decompose(a.clone()).unwrap();
        let mut b = a;
        qr.apply_q_transpose(&mut b).unwrap();
        let r = qr.r(false).unwrap();
        for i in 0..9 {
            for j in 0..5 {
                assert_f64_eq(b.get(i, j), r.get(i, j), 1e-10);
            }
        }
    }

    #[test]
    fn test_operand_rows_must_match() {
        let qr = BlockQr::decompose(random_block(6, 3, 2, 1)).unwrap();
        let mut b = random_block(5, 3, 2, 2);
        assert!(qr.apply_q(&mut b).is_err());
        assert!(qr.apply_q_transpose(&mut b).is_err());
    }
}
