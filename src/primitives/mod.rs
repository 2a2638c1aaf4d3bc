//! Core compute primitives (Vector, Matrix).
//!
//! These types provide the foundation for the feature pipeline and
//! the nearest-neighbor index.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
