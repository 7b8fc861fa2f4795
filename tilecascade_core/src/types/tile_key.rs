//! Tile identity in a Web Mercator tile pyramid
//!
//! This module provides the [`TileKey`] type that addresses one tile by zoom level, column and
//! row. Rows grow downwards (XYZ convention); archives that store rows upwards (TMS convention)
//! translate with [`TileKey::flipped_row`].
//!
//! # Examples
//!
//! ```
//! use tilecascade_core::TileKey;
//!
//! let key = TileKey::new(3, 2, 1).unwrap();
//! assert_eq!(key.flipped_row(), 6);
//! assert_eq!(key.to_string(), "3/2/1");
//!
//! // The parent tile one level up
//! let parent = key.at_zoom(2);
//! assert_eq!((parent.column, parent.row), (1, 0));
//! ```

use anyhow::{Result, ensure};
use std::{
	cmp::Ordering,
	fmt::{self, Debug, Display},
};

/// Highest zoom level a [`TileKey`] can address.
pub const MAX_ZOOM: u8 = 31;

/// Immutable identity of a tile: zoom level, column (x) and row (y).
///
/// Equality and hashing are by value. The total order is only meant for stable log output and
/// sorts by zoom level first, then row-major inside a level.
#[derive(Eq, PartialEq, Clone, Copy, Hash)]
pub struct TileKey {
	/// The zoom level of the tile.
	pub zoom: u8,
	/// The column (x index) of the tile.
	pub column: u32,
	/// The row (y index) of the tile, counted from the top.
	pub row: u32,
}

impl TileKey {
	/// Create a new `TileKey`.
	///
	/// # Errors
	/// Returns an error if `zoom` > 31 or if `column`/`row` are outside the grid of that level.
	pub fn new(zoom: u8, column: u32, row: u32) -> Result<TileKey> {
		ensure!(zoom <= MAX_ZOOM, "zoom ({zoom}) must be <= {MAX_ZOOM}");
		let size = 1u64 << zoom;
		ensure!(u64::from(column) < size, "column ({column}) out of bounds for zoom {zoom}");
		ensure!(u64::from(row) < size, "row ({row}) out of bounds for zoom {zoom}");
		Ok(TileKey { zoom, column, row })
	}

	/// The largest valid column or row index on this key's zoom level.
	pub fn max_index(&self) -> u32 {
		((1u64 << self.zoom) - 1) as u32
	}

	/// The row in the inverted (TMS) convention: `2^zoom - 1 - row`.
	pub fn flipped_row(&self) -> u32 {
		self.max_index() - self.row
	}

	/// Map this key onto another zoom level.
	///
	/// Going up (smaller `zoom`) yields the ancestor that covers this tile. Going down yields the
	/// top-left descendant.
	pub fn at_zoom(&self, zoom: u8) -> TileKey {
		assert!(zoom <= MAX_ZOOM, "zoom ({zoom}) must be <= {MAX_ZOOM}");
		match zoom.cmp(&self.zoom) {
			Ordering::Less => {
				let shift = self.zoom - zoom;
				TileKey {
					zoom,
					column: self.column >> shift,
					row: self.row >> shift,
				}
			}
			Ordering::Greater => {
				let shift = zoom - self.zoom;
				TileKey {
					zoom,
					column: self.column << shift,
					row: self.row << shift,
				}
			}
			Ordering::Equal => *self,
		}
	}

	/// All descendants of this tile on the deeper level `zoom`, row-major.
	pub fn children_at(&self, zoom: u8) -> impl Iterator<Item = TileKey> + use<> {
		assert!(zoom >= self.zoom, "zoom ({zoom}) must be >= {}", self.zoom);
		let first = self.at_zoom(zoom);
		let count = 1u32 << (zoom - self.zoom);
		(0..count).flat_map(move |dy| {
			(0..count).map(move |dx| TileKey {
				zoom,
				column: first.column + dx,
				row: first.row + dy,
			})
		})
	}

	/// Linear index over the whole pyramid: all tiles of lower levels come first.
	pub fn sort_index(&self) -> u64 {
		let size = 1u64 << self.zoom;
		let offset = (size * size - 1) / 3;
		offset + size * u64::from(self.row) + u64::from(self.column)
	}
}

impl Ord for TileKey {
	fn cmp(&self, other: &Self) -> Ordering {
		self.sort_index().cmp(&other.sort_index())
	}
}

impl PartialOrd for TileKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Debug for TileKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileKey({}, [{}, {}])", self.zoom, self.column, self.row)
	}
}

impl Display for TileKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.zoom, self.column, self.row)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn new_checks_bounds() {
		assert!(TileKey::new(0, 0, 0).is_ok());
		assert!(TileKey::new(3, 7, 7).is_ok());
		assert!(TileKey::new(3, 8, 0).is_err());
		assert!(TileKey::new(3, 0, 8).is_err());
		assert!(TileKey::new(32, 0, 0).is_err());
	}

	#[rstest]
	#[case(3, 2, 1, 6)]
	#[case(0, 0, 0, 0)]
	#[case(1, 0, 0, 1)]
	#[case(10, 5, 1023, 0)]
	fn flipped_row(#[case] zoom: u8, #[case] column: u32, #[case] row: u32, #[case] expected: u32) {
		let key = TileKey::new(zoom, column, row).unwrap();
		assert_eq!(key.flipped_row(), expected);
	}

	#[test]
	fn at_zoom_up_and_down() {
		let key = TileKey::new(5, 21, 13).unwrap();
		assert_eq!(key.at_zoom(3), TileKey::new(3, 5, 3).unwrap());
		assert_eq!(key.at_zoom(6), TileKey::new(6, 42, 26).unwrap());
		assert_eq!(key.at_zoom(5), key);
	}

	#[test]
	fn children_cover_parent() {
		let key = TileKey::new(2, 1, 3).unwrap();
		let children: Vec<TileKey> = key.children_at(3).collect();
		assert_eq!(
			children,
			vec![
				TileKey::new(3, 2, 6).unwrap(),
				TileKey::new(3, 3, 6).unwrap(),
				TileKey::new(3, 2, 7).unwrap(),
				TileKey::new(3, 3, 7).unwrap(),
			]
		);
		assert_eq!(key.children_at(4).count(), 16);
		assert!(key.children_at(4).all(|child| child.at_zoom(2) == key));
	}

	#[test]
	fn ordering_is_by_level_then_row() {
		let mut keys = vec![
			TileKey::new(2, 0, 1).unwrap(),
			TileKey::new(1, 1, 1).unwrap(),
			TileKey::new(2, 3, 0).unwrap(),
			TileKey::new(0, 0, 0).unwrap(),
		];
		keys.sort();
		assert_eq!(
			keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
			vec!["0/0/0", "1/1/1", "2/3/0", "2/0/1"]
		);
	}

	#[test]
	fn formatting() {
		let key = TileKey::new(12, 2200, 1343).unwrap();
		assert_eq!(format!("{key:?}"), "TileKey(12, [2200, 1343])");
		assert_eq!(format!("{key}"), "12/2200/1343");
	}
}
