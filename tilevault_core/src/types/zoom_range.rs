//! Inclusive zoom-level filters used by every store operation.

use anyhow::{Result, ensure};
use std::fmt::{self, Display};

/// An inclusive range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
	/// The lowest zoom level included.
	pub min: u8,
	/// The highest zoom level included.
	pub max: u8,
}

impl ZoomRange {
	/// The highest zoom level a tile coordinate can address.
	pub const MAX_LEVEL: u8 = 31;

	/// Create a range spanning `min..=max`.
	///
	/// # Errors
	/// Returns an error if `min` > `max` or `max` exceeds [`MAX_LEVEL`](Self::MAX_LEVEL).
	pub fn new(min: u8, max: u8) -> Result<ZoomRange> {
		ensure!(min <= max, "min zoom ({min}) must be <= max zoom ({max})");
		ensure!(
			max <= Self::MAX_LEVEL,
			"max zoom ({max}) must be <= {}",
			Self::MAX_LEVEL
		);
		Ok(ZoomRange { min, max })
	}

	/// Create a range covering a single zoom level.
	pub fn single(level: u8) -> Result<ZoomRange> {
		ZoomRange::new(level, level)
	}

	/// The full range of representable zoom levels.
	#[must_use]
	pub fn full() -> ZoomRange {
		ZoomRange {
			min: 0,
			max: Self::MAX_LEVEL,
		}
	}

	/// Whether `level` falls inside this range.
	#[must_use]
	pub fn contains(&self, level: u8) -> bool {
		self.min <= level && level <= self.max
	}
}

impl Default for ZoomRange {
	fn default() -> Self {
		ZoomRange::full()
	}
}

impl Display for ZoomRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "z{}..z{}", self.min, self.max)
	}
}
