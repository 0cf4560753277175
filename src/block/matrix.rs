use std::cmp::min;

use ndarray::Array2;
use num::Float;
use rand::{distr::uniform::SampleUniform, Rng};

use crate::error::{dimension_error, validation_error, Result};

/// Shape of a tiled matrix and the index arithmetic that goes with it.
///
/// Tiles are stored one after the other in row-major tile order and every
/// tile is row-major inside. The tile whose top-left element is `(br, bc)`
/// starts at `br * cols + h * bc`, where `h` is the height of that tile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    rows: usize,
    cols: usize,
    block_len: usize,
}

impl BlockLayout {
    pub fn new(rows: usize, cols: usize, block_len: usize) -> Result<Self> {
        if block_len == 0 {
            return Err(validation_error("block length must be positive"));
        }
        Ok(Self {
            rows,
            cols,
            block_len,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Total number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First index of the tile containing `index`, for rows and columns alike.
    #[inline]
    pub fn tile_start(&self, index: usize) -> usize {
        index / self.block_len * self.block_len
    }

    /// Height of the tile row starting at `br`.
    #[inline]
    pub fn tile_height(&self, br: usize) -> usize {
        min(self.block_len, self.rows - br)
    }

    /// Width of the tile column starting at `bc`.
    #[inline]
    pub fn tile_width(&self, bc: usize) -> usize {
        min(self.block_len, self.cols - bc)
    }

    /// Number of elements in one full tile row, the chunk size used when
    /// splitting storage by tile rows.
    #[inline]
    pub fn tile_row_len(&self) -> usize {
        self.block_len * self.cols
    }

    /// Offset of `(row, col)` relative to the start of its tile row.
    #[inline]
    pub fn offset_in_tile_row(&self, row: usize, col: usize) -> usize {
        let br = self.tile_start(row);
        let bc = self.tile_start(col);
        self.tile_height(br) * bc + (row - br) * self.tile_width(bc) + (col - bc)
    }

    /// Storage index of element `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the element lies outside the matrix.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "BlockLayout::index: ({row}, {col}) is outside a {}x{} matrix",
            self.rows,
            self.cols
        );
        self.tile_start(row) * self.cols + self.offset_in_tile_row(row, col)
    }
}

/// A dense real matrix stored as fixed-size square tiles.
///
/// Edge tiles on the last tile row or tile column are smaller when the
/// dimensions are not multiples of the block length.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatrix<T> {
    layout: BlockLayout,
    data: Vec<T>,
}

impl<T: Float> BlockMatrix<T> {
    /// Creates a zero-filled `rows x cols` matrix with square tiles of edge `block_len`.
    pub fn new(rows: usize, cols: usize, block_len: usize) -> Result<Self> {
        let layout = BlockLayout::new(rows, cols, block_len)?;
        Ok(Self {
            layout,
            data: vec![T::zero(); layout.len()],
        })
    }

    /// Creates a matrix whose element `(i, j)` is `f(i, j)`.
    pub fn from_fn<F>(rows: usize, cols: usize, block_len: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut matrix = Self::new(rows, cols, block_len)?;
        for i in 0..rows {
            for j in 0..cols {
                matrix.set(i, j, f(i, j));
            }
        }
        Ok(matrix)
    }

    /// `rows x cols` matrix with ones on the main diagonal.
    pub fn identity(rows: usize, cols: usize, block_len: usize) -> Result<Self> {
        let mut matrix = Self::new(rows, cols, block_len)?;
        for i in 0..min(rows, cols) {
            matrix.set(i, i, T::one());
        }
        Ok(matrix)
    }

    /// Converts a dense row/column matrix into block storage.
    pub fn from_array2(a: &Array2<T>, block_len: usize) -> Result<Self> {
        let (rows, cols) = a.dim();
        Self::from_fn(rows, cols, block_len, |i, j| a[[i, j]])
    }

    /// Fills a matrix with values drawn uniformly from `min..max`.
    pub fn random<R>(
        rows: usize,
        cols: usize,
        min: T,
        max: T,
        rng: &mut R,
        block_len: usize,
    ) -> Result<Self>
    where
        R: Rng,
        T: SampleUniform,
    {
        if min >= max {
            return Err(validation_error("random range must satisfy min < max"));
        }
        let layout = BlockLayout::new(rows, cols, block_len)?;
        let data = (0..layout.len()).map(|_| rng.random_range(min..max)).collect();
        Ok(Self { layout, data })
    }

    /// Wraps existing tile-ordered storage.
    pub fn from_raw(rows: usize, cols: usize, block_len: usize, data: Vec<T>) -> Result<Self> {
        let layout = BlockLayout::new(rows, cols, block_len)?;
        if data.len() != layout.len() {
            return Err(dimension_error(
                layout.len(),
                data.len(),
                "block storage length must equal rows * cols",
            ));
        }
        Ok(Self { layout, data })
    }

    /// Converts back to a dense `ndarray` matrix.
    pub fn to_array2(&self) -> Array2<T> {
        Array2::from_shape_fn((self.rows(), self.cols()), |(i, j)| self.get(i, j))
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[self.layout.index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let idx = self.layout.index(row, col);
        self.data[idx] = value;
    }

    /// Contiguous storage of tile `(tile_row, tile_col)`, counted in tiles.
    pub fn tile(&self, tile_row: usize, tile_col: usize) -> &[T] {
        let br = tile_row * self.block_len();
        let bc = tile_col * self.block_len();
        let start = self.layout.index(br, bc);
        let len = self.layout.tile_height(br) * self.layout.tile_width(bc);
        &self.data[start..start + len]
    }

    /// Largest absolute difference against `other`, or `None` if the shapes differ.
    pub fn max_abs_diff(&self, other: &Self) -> Option<T> {
        if self.rows() != other.rows() || self.cols() != other.cols() {
            return None;
        }
        let mut diff = T::zero();
        for i in 0..self.rows() {
            for j in 0..self.cols() {
                diff = diff.max((self.get(i, j) - other.get(i, j)).abs());
            }
        }
        Some(diff)
    }
}

impl<T> BlockMatrix<T> {
    #[inline]
    pub fn rows(&self) -> usize {
        self.layout.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.layout.cols
    }

    /// Edge length of the square tiles.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.layout.block_len
    }

    #[inline]
    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_zero_block_len_is_rejected() {
        assert!(BlockMatrix::<f64>::new(3, 3, 0).is_err());
    }

    #[test]
    fn test_storage_order_with_edge_tiles() {
        // 3x5 with 2x2 tiles: tile rows of height 2 and 1, tile cols of width 2, 2, 1.
        let m = BlockMatrix::from_fn(3, 5, 2, |i, j| (10 * i + j) as f64).unwrap();
        let expected = vec![
            0.0, 1.0, 10.0, 11.0, // tile (0, 0)
            2.0, 3.0, 12.0, 13.0, // tile (0, 1)
            4.0, 14.0, // tile (0, 2)
            20.0, 21.0, // tile (1, 0)
            22.0, 23.0, // tile (1, 1)
            24.0, // tile (1, 2)
        ];
        assert_eq!(m.data(), expected.as_slice());
        assert_eq!(m.tile(0, 2), &[4.0, 14.0]);
        assert_eq!(m.tile(1, 1), &[22.0, 23.0]);
    }

    #[test]
    fn test_get_set_roundtrip_through_ndarray() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0], [10.0, 11.0, 12.0]];
        let mut b = BlockMatrix::from_array2(&a, 3).unwrap();
        assert_eq!(b.get(3, 2), 12.0);
        b.set(3, 2, -1.0);
        let back = b.to_array2();
        assert_eq!(back[[3, 2]], -1.0);
        assert_eq!(back[[1, 1]], 5.0);
    }

    #[test]
    #[should_panic(expected = "outside a 2x2 matrix")]
    fn test_get_out_of_range_panics() {
        let m = BlockMatrix::<f64>::new(2, 2, 2).unwrap();
        m.get(2, 0);
    }

    #[test]
    fn test_random_respects_range() {
        let mut rng = StdRng::seed_from_u64(234);
        let m = BlockMatrix::random(7, 4, -1.0, 1.0, &mut rng, 3).unwrap();
        assert!(m.data().iter().all(|v| (-1.0..1.0).contains(v)));
        assert!(BlockMatrix::random(2, 2, 1.0, 1.0, &mut rng, 3).is_err());
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(BlockMatrix::from_raw(2, 3, 2, vec![0.0; 5]).is_err());
        assert!(BlockMatrix::from_raw(2, 3, 2, vec![0.0; 6]).is_ok());
    }

    #[test]
    fn test_identity_rectangular() {
        let m = BlockMatrix::<f64>::identity(4, 2, 3).unwrap();
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(1, 1), 1.0);
        assert_eq!(m.get(2, 1), 0.0);
        assert_eq!(m.get(3, 0), 0.0);
    }
}
