//! Shared primitives for tilevault: tile coordinates, zoom filters,
//! content hashing, tile byte buffers and progress reporting.

pub mod progress;
pub mod types;

pub use progress::Progress;
pub use types::*;
