//! Tiled matrix storage and the views that address it.
//!
//! A [`BlockMatrix`] keeps its elements in square tiles of a fixed edge
//! length. Algorithms never touch tile arithmetic directly: they work on a
//! [`Submatrix`] or [`SubmatrixMut`] and walk columns with
//! [`ColumnRuns`], which yields one [`TileRun`] per tile crossed.

pub mod matrix;
pub mod submatrix;

pub use matrix::{BlockLayout, BlockMatrix};
pub use submatrix::{paired_runs, ColumnRuns, PairedRuns, Submatrix, SubmatrixMut, TileRun};
