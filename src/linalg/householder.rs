//! Householder kernels for one tile-column (panel) of a block matrix.
//!
//! Every routine works on a view whose row 0 is the diagonal row of the panel
//! and whose columns are the panel's columns, so local column `col` has its
//! pivot at local row `col`. After [`decompose_qr_block_col`] the panel holds
//! the rows of `R` on and above the diagonal and the reflector vectors below
//! it, each with an implicit leading 1.

use num::Float;

use crate::block::{paired_runs, Submatrix, SubmatrixMut};
use crate::error::{dimension_error, Result};

/// Largest absolute value in local column `col`, rows `col + 1..`.
///
/// The pivot row is skipped: it is about to be replaced by the diagonal entry
/// of `R`. Returns `0` when the segment is empty.
///
/// # Panics
///
/// Panics if `col` is not a column of `y`.
pub fn find_max_col<T: Float>(y: &Submatrix<'_, T>, col: usize) -> T {
    let data = y.data();
    let mut max = T::zero();
    for run in y.column_runs(col, col + 1) {
        for idx in run.indices() {
            let v = data[idx].abs();
            if v > max {
                max = v;
            }
        }
    }
    max
}

/// Divides rows `col + 1..` of local column `col` by `div`, in place.
pub fn divide_elements<T: Float>(y: &mut SubmatrixMut<'_, T>, col: usize, div: T) {
    let runs = y.column_runs(col, col + 1);
    let data = y.data_mut();
    for run in runs {
        for idx in run.indices() {
            data[idx] = data[idx] / div;
        }
    }
}

/// Scales rows `col..` of local column `col` by `1 / max` and returns the
/// Euclidean norm of the scaled segment.
///
/// Dividing by the largest magnitude first keeps the sum of squares away from
/// overflow and underflow. The column stays divided by `max` afterwards.
///
/// # Arguments
///
/// * `y` - Panel view.
/// * `col` - Local column; the segment starts at its pivot row.
/// * `max` - Must be at least the largest `|x_i|` of the segment and non-zero.
pub fn compute_tau_and_divide<T: Float>(y: &mut SubmatrixMut<'_, T>, col: usize, max: T) -> T {
    let runs = y.column_runs(col, col);
    let data = y.data_mut();
    let mut tau = T::zero();
    for run in runs {
        for idx in run.indices() {
            let d = data[idx] / max;
            data[idx] = d;
            tau = tau + d * d;
        }
    }
    tau.sqrt()
}

/// Applies the reflector stored in local column `col_v` to local column `col_a`.
///
/// The reflector has an implicit 1 at row `col_v` and the stored values below
/// it. Computes `dot = vᵗa` over rows `col_v..` and then `a -= gamma * dot * v`.
///
/// # Panics
///
/// Panics if either column is outside `y` or `col_v` is not a row of `y`.
pub fn apply_householder_col<T: Float>(
    y: &mut SubmatrixMut<'_, T>,
    col_v: usize,
    col_a: usize,
    gamma: T,
) {
    let pivot = y.index(col_v, col_a);
    let data = y.data();

    let mut dot = data[pivot];
    for (rv, ra) in paired_runs(y.column_runs(col_v, col_v + 1), y.column_runs(col_a, col_v + 1)) {
        for k in 0..rv.len {
            dot = dot + data[rv.at(k)] * data[ra.at(k)];
        }
    }
    let scaled = gamma * dot;

    let runs = paired_runs(y.column_runs(col_v, col_v + 1), y.column_runs(col_a, col_v + 1));
    let data = y.data_mut();
    data[pivot] = data[pivot] - scaled;
    for (rv, ra) in runs {
        for k in 0..rv.len {
            let v = data[rv.at(k)];
            data[ra.at(k)] = data[ra.at(k)] - scaled * v;
        }
    }
}

/// Applies the reflector in local column `col` to every column right of it
/// inside the view.
pub fn apply_householder_panel<T: Float>(y: &mut SubmatrixMut<'_, T>, col: usize, gamma: T) {
    for col_a in col + 1..y.cols() {
        apply_householder_col(y, col, col_a, gamma);
    }
}

/// Factors one panel in place with unblocked Householder reflections.
///
/// `y` must start at the panel's diagonal row and be at most one tile wide.
/// One coefficient per processed column is written to `gammas`, indexed by
/// the global column (`y.col0() + col`). A column that is already zero below
/// its pivot gets a coefficient of `0` and is left untouched.
///
/// Reflectors are applied to the remaining columns of the panel only; the
/// trailing matrix is updated separately from the compact WY form.
pub fn decompose_qr_block_col<T: Float>(y: &mut SubmatrixMut<'_, T>, gammas: &mut [T]) -> Result<()> {
    let width = y.cols();
    if width > y.block_len() {
        return Err(dimension_error(
            y.block_len(),
            width,
            "panel must not be wider than the block length",
        ));
    }
    if gammas.len() < y.col0() + width {
        return Err(dimension_error(
            y.col0() + width,
            gammas.len(),
            "coefficient array is shorter than the panel's last column",
        ));
    }

    for col in 0..width.min(y.rows()) {
        let tail_max = find_max_col(&y.as_view(), col);
        if tail_max == T::zero() {
            log::trace!("column {} is already reduced", y.col0() + col);
            gammas[y.col0() + col] = T::zero();
            continue;
        }

        let pivot = y.index(col, col);
        let max = tail_max.max(y.data()[pivot].abs());

        let mut tau = compute_tau_and_divide(y, col, max);
        let u_0 = y.data()[pivot];
        if u_0 < T::zero() {
            tau = -tau;
        }
        let u_0 = u_0 + tau;
        divide_elements(y, col, u_0);
        y.data_mut()[pivot] = -tau * max;

        let gamma = u_0 / tau;
        gammas[y.col0() + col] = gamma;

        apply_householder_panel(y, col, gamma);
    }
    Ok(())
}
