pub mod householder;
pub mod qr;
pub mod wy;
