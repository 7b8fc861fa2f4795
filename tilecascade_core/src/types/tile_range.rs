//! Rectangular ranges of tiles on a single zoom level.
//!
//! A [`TileRange`] describes the tiles a caller is interested in right now, e.g. the visible
//! viewport after a zoom change. Bounds are inclusive.
//!
//! ```
//! use tilecascade_core::{TileKey, TileRange};
//!
//! let range = TileRange::new(4, 2, 3, 4, 5).unwrap();
//! assert_eq!(range.count(), 9);
//! assert!(range.contains(&TileKey::new(4, 3, 4).unwrap()));
//! ```

use super::TileKey;
use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

/// An inclusive rectangle of tiles on one zoom level.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRange {
	pub zoom: u8,
	pub column_min: u32,
	pub row_min: u32,
	pub column_max: u32,
	pub row_max: u32,
}

impl TileRange {
	/// Create a range from its inclusive corner indices.
	///
	/// # Errors
	/// Returns an error if a corner is outside the grid or min > max.
	pub fn new(zoom: u8, column_min: u32, row_min: u32, column_max: u32, row_max: u32) -> Result<TileRange> {
		TileKey::new(zoom, column_min, row_min)?;
		TileKey::new(zoom, column_max, row_max)?;
		ensure!(
			column_min <= column_max,
			"column_min ({column_min}) must be <= column_max ({column_max})"
		);
		ensure!(row_min <= row_max, "row_min ({row_min}) must be <= row_max ({row_max})");
		Ok(TileRange {
			zoom,
			column_min,
			row_min,
			column_max,
			row_max,
		})
	}

	/// The whole grid of a zoom level.
	pub fn full(zoom: u8) -> Result<TileRange> {
		ensure!(zoom <= super::MAX_ZOOM, "zoom ({zoom}) must be <= {}", super::MAX_ZOOM);
		let max = ((1u64 << zoom) - 1) as u32;
		TileRange::new(zoom, 0, 0, max, max)
	}

	/// Range with a single tile.
	pub fn from_key(key: &TileKey) -> TileRange {
		TileRange {
			zoom: key.zoom,
			column_min: key.column,
			row_min: key.row,
			column_max: key.column,
			row_max: key.row,
		}
	}

	pub fn width(&self) -> u32 {
		self.column_max - self.column_min + 1
	}

	pub fn height(&self) -> u32 {
		self.row_max - self.row_min + 1
	}

	/// Number of tiles in the range.
	pub fn count(&self) -> u64 {
		u64::from(self.width()) * u64::from(self.height())
	}

	pub fn contains(&self, key: &TileKey) -> bool {
		key.zoom == self.zoom
			&& key.column >= self.column_min
			&& key.column <= self.column_max
			&& key.row >= self.row_min
			&& key.row <= self.row_max
	}

	/// The tiles both ranges cover, `None` if they do not overlap or lie on different levels.
	pub fn intersection(&self, other: &TileRange) -> Option<TileRange> {
		if self.zoom != other.zoom {
			return None;
		}
		let column_min = self.column_min.max(other.column_min);
		let row_min = self.row_min.max(other.row_min);
		let column_max = self.column_max.min(other.column_max);
		let row_max = self.row_max.min(other.row_max);
		(column_min <= column_max && row_min <= row_max).then_some(TileRange {
			zoom: self.zoom,
			column_min,
			row_min,
			column_max,
			row_max,
		})
	}

	/// The descendants of `key` on the deeper level `zoom`.
	pub fn descendants(key: &TileKey, zoom: u8) -> TileRange {
		assert!(zoom >= key.zoom, "zoom ({zoom}) must be >= {}", key.zoom);
		let first = key.at_zoom(zoom);
		let last = (1u32 << (zoom - key.zoom)) - 1;
		TileRange {
			zoom,
			column_min: first.column,
			row_min: first.row,
			column_max: first.column + last,
			row_max: first.row + last,
		}
	}

	/// Iterate all keys row by row.
	pub fn iter_keys(&self) -> impl Iterator<Item = TileKey> + use<> {
		let range = *self;
		(range.row_min..=range.row_max).flat_map(move |row| {
			(range.column_min..=range.column_max).map(move |column| TileKey {
				zoom: range.zoom,
				column,
				row,
			})
		})
	}
}

impl Debug for TileRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}: [{}, {}, {}, {}] ({})",
			self.zoom,
			self.column_min,
			self.row_min,
			self.column_max,
			self.row_max,
			self.count()
		)
	}
}
