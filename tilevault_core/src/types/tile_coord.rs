//! Tile coordinates in a square tile pyramid.
//!
//! A [`TileCoord`] addresses one cell of a zoom-level grid. The row axis can
//! follow either a top-origin or a bottom-origin convention; [`flip_y`]
//! converts between the two and is its own inverse.
//!
//! [`flip_y`]: TileCoord::flip_y

use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

/// A tile coordinate with zoom level and x/y grid indices.
#[derive(Eq, PartialEq, Clone, Hash, Copy)]
pub struct TileCoord {
	/// The zoom level of the tile.
	pub level: u8,
	/// The column index of the tile.
	pub x: u32,
	/// The row index of the tile.
	pub y: u32,
}

impl TileCoord {
	/// Create a new `TileCoord` at the given zoom `level` and tile indices `x`, `y`.
	///
	/// # Errors
	/// Returns an error if `level` > 31 or the indices are out of bounds for the level.
	pub fn new(level: u8, x: u32, y: u32) -> Result<TileCoord> {
		ensure!(level <= 31, "level ({level}) must be <= 31");
		let max = 2u32.pow(u32::from(level));
		ensure!(x < max, "x ({x}) out of bounds for level {level}");
		ensure!(y < max, "y ({y}) out of bounds for level {level}");
		Ok(TileCoord { level, x, y })
	}

	/// Get the maximum valid x or y index for this tile's zoom level, `2^level - 1`.
	#[must_use]
	pub fn max_value(&self) -> u32 {
		(1u32 << self.level) - 1
	}

	/// Flip the y index vertically within the tile grid.
	///
	/// Converts between top-origin and bottom-origin row numbering for the
	/// same zoom level. Applying it twice returns the original coordinate.
	pub fn flip_y(&mut self) {
		self.y = self.max_value() - self.y;
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_fmt(format_args!("TileCoord({}, [{}, {}])", &self.level, &self.x, &self.y))
	}
}
