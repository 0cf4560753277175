use num::Float;

use super::matrix::{BlockLayout, BlockMatrix};
use crate::error::{bounds_error, Result};

/// A stretch of one column that stays inside a single tile.
///
/// Consecutive rows of a column are `stride` elements apart inside a tile,
/// and the stretch ends where the tile does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRun {
    /// Row of the first element, relative to the view that produced the run.
    pub row: usize,
    /// Storage index of the first element.
    pub start: usize,
    /// Distance between consecutive rows, the width of the tile.
    pub stride: usize,
    /// Number of rows covered.
    pub len: usize,
}

impl TileRun {
    /// Storage index of the `k`-th element of the run.
    #[inline]
    pub fn at(&self, k: usize) -> usize {
        self.start + k * self.stride
    }

    /// Storage indices of every element of the run, top to bottom.
    #[inline]
    pub fn indices(&self) -> impl Iterator<Item = usize> {
        let (start, stride) = (self.start, self.stride);
        (0..self.len).map(move |k| start + k * stride)
    }

    fn split_at(self, k: usize) -> (TileRun, TileRun) {
        let head = TileRun { len: k, ..self };
        let tail = TileRun {
            row: self.row + k,
            start: self.at(k),
            stride: self.stride,
            len: self.len - k,
        };
        (head, tail)
    }
}

/// Walks one column of a block matrix tile by tile.
///
/// Only copies of the layout are held, so the iterator never borrows the
/// matrix and writes through the matching view stay possible.
#[derive(Debug, Clone)]
pub struct ColumnRuns {
    layout: BlockLayout,
    col: usize,
    view_row0: usize,
    next_row: usize,
    row_end: usize,
}

impl ColumnRuns {
    fn new(layout: BlockLayout, col: usize, view_row0: usize, from: usize, row_end: usize) -> Self {
        Self {
            layout,
            col,
            view_row0,
            next_row: from.min(row_end),
            row_end,
        }
    }
}

impl Iterator for ColumnRuns {
    type Item = TileRun;

    fn next(&mut self) -> Option<TileRun> {
        if self.next_row >= self.row_end {
            return None;
        }
        let br = self.layout.tile_start(self.next_row);
        let end = self.row_end.min(br + self.layout.tile_height(br));
        let bc = self.layout.tile_start(self.col);
        let run = TileRun {
            row: self.next_row - self.view_row0,
            start: self.layout.index(self.next_row, self.col),
            stride: self.layout.tile_width(bc),
            len: end - self.next_row,
        };
        self.next_row = end;
        Some(run)
    }
}

/// Walks two columns over the same number of rows in lockstep.
///
/// The columns may come from matrices whose tile rows start at different
/// offsets, so runs are cut wherever either side crosses a tile boundary.
pub struct PairedRuns {
    left: ColumnRuns,
    right: ColumnRuns,
    pending_left: Option<TileRun>,
    pending_right: Option<TileRun>,
}

impl Iterator for PairedRuns {
    type Item = (TileRun, TileRun);

    fn next(&mut self) -> Option<(TileRun, TileRun)> {
        let left = self.pending_left.take().or_else(|| self.left.next())?;
        let right = self.pending_right.take().or_else(|| self.right.next())?;
        let len = left.len.min(right.len);
        let (left_head, left_tail) = left.split_at(len);
        let (right_head, right_tail) = right.split_at(len);
        if left_tail.len > 0 {
            self.pending_left = Some(left_tail);
        }
        if right_tail.len > 0 {
            self.pending_right = Some(right_tail);
        }
        Some((left_head, right_head))
    }
}

/// Pairs two column walks that cover the same number of rows.
pub fn paired_runs(left: ColumnRuns, right: ColumnRuns) -> PairedRuns {
    debug_assert_eq!(
        left.row_end - left.next_row,
        right.row_end - right.next_row,
        "paired_runs: columns cover a different number of rows"
    );
    PairedRuns {
        left,
        right,
        pending_left: None,
        pending_right: None,
    }
}

fn check_bounds(
    layout: BlockLayout,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
) -> Result<()> {
    if row0 > row1 || col0 > col1 || row1 > layout.rows() || col1 > layout.cols() {
        return Err(bounds_error(
            row0,
            row1,
            col0,
            col1,
            layout.rows(),
            layout.cols(),
        ));
    }
    Ok(())
}

macro_rules! view_accessors {
    () => {
        #[inline]
        pub fn row0(&self) -> usize {
            self.row0
        }

        #[inline]
        pub fn row1(&self) -> usize {
            self.row1
        }

        #[inline]
        pub fn col0(&self) -> usize {
            self.col0
        }

        #[inline]
        pub fn col1(&self) -> usize {
            self.col1
        }

        #[inline]
        pub fn rows(&self) -> usize {
            self.row1 - self.row0
        }

        #[inline]
        pub fn cols(&self) -> usize {
            self.col1 - self.col0
        }

        #[inline]
        pub fn block_len(&self) -> usize {
            self.original.block_len()
        }

        #[inline]
        pub fn layout(&self) -> BlockLayout {
            self.original.layout()
        }

        /// Storage index of local element `(i, j)`.
        ///
        /// # Panics
        ///
        /// Panics if `(i, j)` lies outside the view.
        #[inline]
        pub fn index(&self, i: usize, j: usize) -> usize {
            assert!(
                i < self.rows() && j < self.cols(),
                "submatrix index ({i}, {j}) is outside a {}x{} view",
                self.rows(),
                self.cols()
            );
            self.original.layout().index(self.row0 + i, self.col0 + j)
        }

        /// Tile runs of local column `col` from local row `from` to the bottom of the view.
        ///
        /// # Panics
        ///
        /// Panics if `col` lies outside the view.
        pub fn column_runs(&self, col: usize, from: usize) -> ColumnRuns {
            assert!(
                col < self.cols(),
                "column {col} is outside a view with {} columns",
                self.cols()
            );
            ColumnRuns::new(
                self.original.layout(),
                self.col0 + col,
                self.row0,
                self.row0 + from,
                self.row1,
            )
        }

        #[inline]
        pub fn data(&self) -> &[T] {
            self.original.data()
        }
    };
}

/// Read-only rectangular window over a [`BlockMatrix`].
///
/// Bounds are half-open and in global element coordinates. Local indices
/// passed to [`Submatrix::get`] are relative to `(row0, col0)`.
#[derive(Debug)]
pub struct Submatrix<'a, T> {
    original: &'a BlockMatrix<T>,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
}

impl<T> Clone for Submatrix<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Submatrix<'_, T> {}

impl<'a, T: Float> Submatrix<'a, T> {
    pub fn new(
        original: &'a BlockMatrix<T>,
        row0: usize,
        row1: usize,
        col0: usize,
        col1: usize,
    ) -> Result<Self> {
        check_bounds(original.layout(), row0, row1, col0, col1)?;
        Ok(Self {
            original,
            row0,
            row1,
            col0,
            col1,
        })
    }

    /// A view spanning the whole matrix.
    pub fn full(original: &'a BlockMatrix<T>) -> Self {
        Self {
            row0: 0,
            row1: original.rows(),
            col0: 0,
            col1: original.cols(),
            original,
        }
    }

    view_accessors!();

    #[inline]
    pub fn original(&self) -> &'a BlockMatrix<T> {
        self.original
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.original.data()[self.index(i, j)]
    }

    /// A narrower view, with bounds relative to this one.
    pub fn subview(&self, row0: usize, row1: usize, col0: usize, col1: usize) -> Result<Self> {
        check_bounds(
            BlockLayout::new(self.rows(), self.cols(), self.block_len())?,
            row0,
            row1,
            col0,
            col1,
        )?;
        Ok(Self {
            original: self.original,
            row0: self.row0 + row0,
            row1: self.row0 + row1,
            col0: self.col0 + col0,
            col1: self.col0 + col1,
        })
    }

    /// Copies the window into a new matrix with the same block length.
    pub fn to_block_matrix(&self) -> Result<BlockMatrix<T>> {
        BlockMatrix::from_fn(self.rows(), self.cols(), self.block_len(), |i, j| {
            self.get(i, j)
        })
    }
}

/// Mutable rectangular window over a [`BlockMatrix`].
#[derive(Debug)]
pub struct SubmatrixMut<'a, T> {
    original: &'a mut BlockMatrix<T>,
    row0: usize,
    row1: usize,
    col0: usize,
    col1: usize,
}

impl<'a, T: Float> SubmatrixMut<'a, T> {
    pub fn new(
        original: &'a mut BlockMatrix<T>,
        row0: usize,
        row1: usize,
        col0: usize,
        col1: usize,
    ) -> Result<Self> {
        check_bounds(original.layout(), row0, row1, col0, col1)?;
        Ok(Self {
            original,
            row0,
            row1,
            col0,
            col1,
        })
    }

    /// A view spanning the whole matrix.
    pub fn full(original: &'a mut BlockMatrix<T>) -> Self {
        Self {
            row0: 0,
            row1: original.rows(),
            col0: 0,
            col1: original.cols(),
            original,
        }
    }

    view_accessors!();

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.original.data()[self.index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let idx = self.index(i, j);
        self.original.data_mut()[idx] = value;
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        self.original.data_mut()
    }

    /// Read-only view of the same window.
    #[inline]
    pub fn as_view(&self) -> Submatrix<'_, T> {
        Submatrix {
            original: &*self.original,
            row0: self.row0,
            row1: self.row1,
            col0: self.col0,
            col1: self.col1,
        }
    }

    /// Shorter-lived mutable view of the same window.
    #[inline]
    pub fn reborrow(&mut self) -> SubmatrixMut<'_, T> {
        SubmatrixMut {
            original: &mut *self.original,
            row0: self.row0,
            row1: self.row1,
            col0: self.col0,
            col1: self.col1,
        }
    }

    /// A narrower mutable view, with bounds relative to this one.
    pub fn subview_mut(
        &mut self,
        row0: usize,
        row1: usize,
        col0: usize,
        col1: usize,
    ) -> Result<SubmatrixMut<'_, T>> {
        check_bounds(
            BlockLayout::new(self.rows(), self.cols(), self.block_len())?,
            row0,
            row1,
            col0,
            col1,
        )?;
        Ok(SubmatrixMut {
            row0: self.row0 + row0,
            row1: self.row0 + row1,
            col0: self.col0 + col0,
            col1: self.col0 + col1,
            original: &mut *self.original,
        })
    }
}
