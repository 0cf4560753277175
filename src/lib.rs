//! Blocked Householder QR decomposition for matrices stored in tiled layout.
//!
//! A [`BlockMatrix`] is factored panel by panel: each tile-column is reduced
//! with unblocked Householder reflections, the reflectors are accumulated in
//! compact WY form (`I + W * Yᵗ`), and the trailing matrix is updated with two
//! block products instead of one rank-1 update per reflector.
//!
//! ```
//! use blockqr::{BlockMatrix, BlockQr, DEFAULT_BLOCK_LEN};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let a = BlockMatrix::random(200, 150, -1.0, 1.0, &mut rng, DEFAULT_BLOCK_LEN)?;
//! let qr = BlockQr::decompose(a)?;
//! assert_eq!(qr.r(true)?.rows(), 150);
//! # Ok::<(), blockqr::BlockQrError>(())
//! ```

pub mod block;
pub mod error;
pub mod linalg;

#[cfg(test)]
mod test_utils;

pub use block::{BlockMatrix, Submatrix, SubmatrixMut};
pub use error::{BlockQrError, Result};
pub use linalg::qr::{decompose_in_place, decompose_in_place_with, BlockQr, BlockQrOptions};

/// Tile edge used when the caller has no reason to pick another.
pub const DEFAULT_BLOCK_LEN: usize = 60;

/// Smallest block WY target, in elements, worth splitting across threads.
pub const PARALLEL_THRESHOLD: usize = 128 * 128;
