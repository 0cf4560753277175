//! Compact WY representation of the reflectors of one panel.
//!
//! For the reflectors `H_j = I - gamma_j * y_j * y_jᵗ` of a panel, the product
//! `H_0 * H_1 * ... * H_{k-1}` equals `I + W * Yᵗ`, where `Y` holds the
//! reflector vectors (already stored below the panel's diagonal) and `W` is
//! built one column at a time:
//!
//! ```text
//! W[:, 0] = -gamma_0 * y_0
//! W[:, k] = -gamma_k * (y_k + W[:, ..k] * (Y[:, ..k]ᵗ * y_k))
//! ```
//!
//! `Y` is never materialized: column `j` reads as zero above local row `j`,
//! one at row `j` and the stored entries below it.
//!
//! Applying the panel's `Qᵗ = I + Y * Wᵗ` to the trailing matrix becomes two
//! block products instead of `k` rank-1 updates.

use std::cmp::min;

use num::Float;
use rayon::prelude::*;

use crate::block::{paired_runs, BlockLayout, Submatrix, SubmatrixMut};
use crate::error::{dimension_error, Result};

/// Element `(i, j)` of the implicit reflector matrix `Y`.
#[inline]
fn reflector_at<T: Float>(y: &Submatrix<'_, T>, i: usize, j: usize) -> T {
    if i < j {
        T::zero()
    } else if i == j {
        T::one()
    } else {
        y.get(i, j)
    }
}

/// Writes `W[:, 0] = -gamma * y_0`.
///
/// # Panics
///
/// Panics if `w` and `y` have a different number of rows or either is empty.
pub fn initialize_w<T: Float>(w: &mut SubmatrixMut<'_, T>, y: &Submatrix<'_, T>, gamma: T) {
    assert_eq!(
        w.rows(),
        y.rows(),
        "initialize_w: W and Y must cover the same rows"
    );
    let top = w.index(0, 0);
    let runs = paired_runs(w.column_runs(0, 1), y.column_runs(0, 1));
    let y_data = y.data();
    let w_data = w.data_mut();
    w_data[top] = -gamma;
    for (rw, ry) in runs {
        for k in 0..rw.len {
            w_data[rw.at(k)] = -gamma * y_data[ry.at(k)];
        }
    }
}

/// Inner products of reflector column `m` against the first `m` reflector columns.
///
/// `out[j] = Σ_i Y[i, j] * Y[i, m]` for `j < m`. Only rows `m..` contribute,
/// since column `m` is zero above row `m`; at row `m` its implicit one meets
/// the stored entry `Y[m, j]`.
pub fn compute_y_t_v<T: Float>(y: &Submatrix<'_, T>, m: usize, out: &mut [T]) {
    assert!(
        m < y.rows() && m < y.cols(),
        "compute_y_t_v: reflector {m} does not exist in a {}x{} panel",
        y.rows(),
        y.cols()
    );
    let data = y.data();
    for (j, slot) in out.iter_mut().enumerate().take(m) {
        let mut total = data[y.index(m, j)];
        for (rj, rm) in paired_runs(y.column_runs(j, m + 1), y.column_runs(m, m + 1)) {
            for k in 0..rj.len {
                total = total + data[rj.at(k)] * data[rm.at(k)];
            }
        }
        *slot = total;
    }
}

/// Writes `W[:, m] = -gamma * (y_m + W[:, ..m] * t)`.
///
/// Only the first `m` columns of `W` are read; `t` comes from
/// [`compute_y_t_v`].
pub fn compute_z<T: Float>(
    y: &Submatrix<'_, T>,
    w: &mut SubmatrixMut<'_, T>,
    m: usize,
    t: &[T],
    gamma: T,
) {
    assert!(t.len() >= m, "compute_z: need {m} inner products, got {}", t.len());
    assert_eq!(w.rows(), y.rows(), "compute_z: W and Y must cover the same rows");

    // z = y_m
    let pivot = w.index(m, m);
    let above = w.column_runs(m, 0).take_while(|run| run.row < m).collect::<Vec<_>>();
    let below = paired_runs(w.column_runs(m, m + 1), y.column_runs(m, m + 1));
    let y_data = y.data();
    let w_data = w.data_mut();
    for run in above {
        for idx in run.indices().take(m - run.row) {
            w_data[idx] = T::zero();
        }
    }
    w_data[pivot] = T::one();
    for (rw, ry) in below {
        for k in 0..rw.len {
            w_data[rw.at(k)] = y_data[ry.at(k)];
        }
    }

    // z += W[:, j] * t[j]
    for (j, &tj) in t.iter().enumerate().take(m) {
        let runs = paired_runs(w.column_runs(m, 0), w.column_runs(j, 0));
        let w_data = w.data_mut();
        for (rz, rj) in runs {
            for k in 0..rz.len {
                w_data[rz.at(k)] = w_data[rz.at(k)] + w_data[rj.at(k)] * tj;
            }
        }
    }

    // z *= -gamma
    let runs = w.column_runs(m, 0);
    let w_data = w.data_mut();
    for run in runs {
        for idx in run.indices() {
            w_data[idx] = -gamma * w_data[idx];
        }
    }
}

/// Builds every column of `W` for the reflectors stored in `y`.
///
/// `gammas[gamma_offset + j]` is the coefficient of reflector `j`; `temp`
/// needs room for one inner product per reflector.
pub fn compute_w_column<T: Float>(
    y: &Submatrix<'_, T>,
    w: &mut SubmatrixMut<'_, T>,
    temp: &mut [T],
    gammas: &[T],
    gamma_offset: usize,
) {
    let count = min(min(y.cols(), y.rows()), w.cols());
    if count == 0 {
        return;
    }
    let mut wy = CompactWy::new(w.reborrow());
    wy.initialize(y, gammas[gamma_offset]);
    for m in 1..count {
        wy.extend(y, gammas[gamma_offset + m], temp);
    }
}

/// Append-only builder for the `W` factor of one panel.
///
/// Tracks how many columns of `W` are valid; columns are added strictly in
/// order and applying an unbuilt factor is a programming error.
#[derive(Debug)]
pub struct CompactWy<'a, T> {
    w: SubmatrixMut<'a, T>,
    built: usize,
}

impl<'a, T: Float> CompactWy<'a, T> {
    /// Wraps scratch storage for `W`. Its row count must match the panel's.
    pub fn new(w: SubmatrixMut<'a, T>) -> Self {
        Self { w, built: 0 }
    }

    /// Builds `W` for the first `min(rows, cols)` reflectors of `y` in one go.
    pub fn build(w: SubmatrixMut<'a, T>, y: &Submatrix<'_, T>, gammas: &[T]) -> Self {
        let count = min(min(y.cols(), y.rows()), w.cols());
        let mut wy = Self::new(w);
        if count == 0 {
            return wy;
        }
        let mut temp = vec![T::zero(); count];
        wy.initialize(y, gammas[0]);
        for m in 1..count {
            wy.extend(y, gammas[m], &mut temp);
        }
        wy
    }

    /// Number of valid columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.built
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.built == 0
    }

    /// First column: `W[:, 0] = -gamma * y_0`.
    ///
    /// # Panics
    ///
    /// Panics if a column was already built.
    pub fn initialize(&mut self, y: &Submatrix<'_, T>, gamma: T) {
        assert_eq!(self.built, 0, "CompactWy::initialize called on a started factor");
        initialize_w(&mut self.w, y, gamma);
        self.built = 1;
    }

    /// Appends the column for reflector `len()` with coefficient `gamma`.
    ///
    /// # Panics
    ///
    /// Panics before [`CompactWy::initialize`], when `W` has no room for
    /// another column, or when `temp` is shorter than `len()`.
    pub fn extend(&mut self, y: &Submatrix<'_, T>, gamma: T, temp: &mut [T]) {
        assert!(self.built > 0, "CompactWy::extend called before initialize");
        let m = self.built;
        assert!(
            m < self.w.cols(),
            "CompactWy::extend: W has room for {} columns",
            self.w.cols()
        );
        compute_y_t_v(y, m, temp);
        compute_z(y, &mut self.w, m, &temp[..m], gamma);
        self.built += 1;
    }

    /// View over the valid columns of `W`.
    pub fn w(&self) -> Submatrix<'_, T> {
        let full = self.w.as_view();
        match full.subview(0, full.rows(), 0, self.built) {
            Ok(view) => view,
            Err(_) => unreachable!("built never exceeds the width of W"),
        }
    }

    /// `x <- x + W * (Yᵗ * x)`, the product `H_0 * ... * H_{k-1}` applied to `x`.
    ///
    /// # Panics
    ///
    /// Panics if nothing was built or `x` does not have one entry per row.
    pub fn apply(&self, y: &Submatrix<'_, T>, x: &mut [T]) {
        self.check_apply(y, x);
        let s: Vec<T> = (0..self.built)
            .map(|j| {
                (j..x.len()).fold(T::zero(), |acc, i| acc + reflector_at(y, i, j) * x[i])
            })
            .collect();
        let data = self.w.data();
        for (j, &sj) in s.iter().enumerate() {
            for run in self.w.column_runs(j, 0) {
                for (k, idx) in run.indices().enumerate() {
                    x[run.row + k] = x[run.row + k] + data[idx] * sj;
                }
            }
        }
    }

    /// `x <- x + Y * (Wᵗ * x)`, the product `H_{k-1} * ... * H_0` applied to `x`.
    pub fn apply_transpose(&self, y: &Submatrix<'_, T>, x: &mut [T]) {
        self.check_apply(y, x);
        let data = self.w.data();
        let s: Vec<T> = (0..self.built)
            .map(|j| {
                self.w.column_runs(j, 0).fold(T::zero(), |acc, run| {
                    run.indices()
                        .enumerate()
                        .fold(acc, |acc, (k, idx)| acc + data[idx] * x[run.row + k])
                })
            })
            .collect();
        for (j, &sj) in s.iter().enumerate() {
            for (i, xi) in x.iter_mut().enumerate().skip(j) {
                *xi = *xi + reflector_at(y, i, j) * sj;
            }
        }
    }

    fn check_apply(&self, y: &Submatrix<'_, T>, x: &[T]) {
        assert!(self.built > 0, "CompactWy: no columns have been built");
        assert!(
            y.cols() >= self.built && y.rows() == self.w.rows(),
            "CompactWy: Y does not match the factor"
        );
        assert_eq!(x.len(), self.w.rows(), "CompactWy: vector length must match the panel rows");
    }
}

fn check_block_operands<T: Float>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &SubmatrixMut<'_, T>,
) -> Result<()> {
    if w.rows() != y.rows() {
        return Err(dimension_error(y.rows(), w.rows(), "W must have as many rows as Y"));
    }
    if b.rows() != y.rows() {
        return Err(dimension_error(y.rows(), b.rows(), "B must have as many rows as Y"));
    }
    if y.cols() < w.cols() {
        return Err(dimension_error(w.cols(), y.cols(), "Y needs one reflector per column of W"));
    }
    if w.cols() > y.rows() {
        return Err(dimension_error(y.rows(), w.cols(), "W has more columns than rows"));
    }
    Ok(())
}

/// `temp[j * n + c] = Σ_i left(i, j) * B[i, c]` for the first `k` columns of the left factor.
fn left_transpose_times<T, F>(k: usize, b: &SubmatrixMut<'_, T>, left: F) -> Vec<T>
where
    T: Float,
    F: Fn(usize, usize) -> T,
{
    let n = b.cols();
    let data = b.data();
    let mut temp = vec![T::zero(); k * n];
    for c in 0..n {
        for run in b.column_runs(c, 0) {
            for (offset, idx) in run.indices().enumerate() {
                let i = run.row + offset;
                let value = data[idx];
                for j in 0..k {
                    temp[j * n + c] = temp[j * n + c] + left(i, j) * value;
                }
            }
        }
    }
    temp
}

/// Adds `Σ_j left(i, j) * temp[j, c]` to every element of `b` that lives in
/// the tile row starting at global row `br`. `chunk` is that tile row's storage.
fn accumulate_tile_row<T, F>(
    chunk: &mut [T],
    br: usize,
    layout: BlockLayout,
    bounds: (usize, usize, usize, usize),
    k: usize,
    temp: &[T],
    left: &F,
) where
    T: Float,
    F: Fn(usize, usize) -> T,
{
    let (row0, row1, col0, col1) = bounds;
    let n = col1 - col0;
    let lo = br.max(row0);
    let hi = (br + layout.tile_height(br)).min(row1);
    for gr in lo..hi {
        let i = gr - row0;
        for gc in col0..col1 {
            let c = gc - col0;
            let mut acc = T::zero();
            for j in 0..k {
                acc = acc + left(i, j) * temp[j * n + c];
            }
            let idx = layout.offset_in_tile_row(gr, gc);
            chunk[idx] = chunk[idx] + acc;
        }
    }
}

fn accumulate<T, F>(b: &mut SubmatrixMut<'_, T>, k: usize, temp: &[T], left: F, parallel: bool)
where
    T: Float + Send + Sync,
    F: Fn(usize, usize) -> T + Sync,
{
    let layout = b.layout();
    let bounds = (b.row0(), b.row1(), b.col0(), b.col1());
    if layout.is_empty() || bounds.0 == bounds.1 || bounds.2 == bounds.3 {
        return;
    }
    let chunk_len = layout.tile_row_len();
    let first_tile_row = bounds.0 / layout.block_len();
    let data = b.data_mut();
    if parallel {
        data.par_chunks_mut(chunk_len)
            .enumerate()
            .skip(first_tile_row)
            .for_each(|(t, chunk)| {
                accumulate_tile_row(chunk, t * layout.block_len(), layout, bounds, k, temp, &left)
            });
    } else {
        data.chunks_mut(chunk_len)
            .enumerate()
            .skip(first_tile_row)
            .for_each(|(t, chunk)| {
                accumulate_tile_row(chunk, t * layout.block_len(), layout, bounds, k, temp, &left)
            });
    }
}

fn wy_transpose<T>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &mut SubmatrixMut<'_, T>,
    parallel: bool,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    check_block_operands(y, w, b)?;
    let k = w.cols();
    let temp = left_transpose_times(k, b, |i, j| w.get(i, j));
    accumulate(b, k, &temp, |i, j| reflector_at(y, i, j), parallel);
    Ok(())
}

fn wy<T>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &mut SubmatrixMut<'_, T>,
    parallel: bool,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    check_block_operands(y, w, b)?;
    let k = w.cols();
    let temp = left_transpose_times(k, b, |i, j| reflector_at(y, i, j));
    accumulate(b, k, &temp, |i, j| w.get(i, j), parallel);
    Ok(())
}

/// Applies the panel's `Qᵗ` to `b`: `B <- B + Y * (Wᵗ * B)`.
///
/// This is the trailing-matrix update that follows a panel factorization.
/// `y` holds the panel's reflectors and `w` exactly as many columns of `W`
/// as there are reflectors to apply. All three views cover the same rows.
pub fn apply_wy_transpose<T>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &mut SubmatrixMut<'_, T>,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    wy_transpose(y, w, b, false)
}

/// Same as [`apply_wy_transpose`], splitting the second product across tile
/// rows with Rayon.
pub fn par_apply_wy_transpose<T>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &mut SubmatrixMut<'_, T>,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    wy_transpose(y, w, b, true)
}

/// Applies the panel's `Q` to `b`: `B <- B + W * (Yᵗ * B)`.
pub fn apply_wy<T>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &mut SubmatrixMut<'_, T>,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    wy(y, w, b, false)
}

/// Same as [`apply_wy`], splitting the second product across tile rows with Rayon.
pub fn par_apply_wy<T>(
    y: &Submatrix<'_, T>,
    w: &Submatrix<'_, T>,
    b: &mut SubmatrixMut<'_, T>,
) -> Result<()>
where
    T: Float + Send + Sync,
{
    wy(y, w, b, true)
}
