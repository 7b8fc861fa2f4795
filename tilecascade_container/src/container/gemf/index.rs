//! The header of a GEMF archive: tile sources and the ranges that map tiles to index tables.
//!
//! All integers are big-endian.
//!
//! ```text
//! u32 version
//! u32 tile_size
//! u32 source_count
//!   per source: u32 index, u32 name_length, name bytes
//! u32 range_count
//!   per range:  u32 zoom, u32 x_min, u32 x_max, u32 y_min, u32 y_max, u32 source_index, u64 offset
//! ```
//!
//! `offset` points to a table of 12 byte entries (`u64 data_offset`, `u32 length`), one per tile of
//! the range, ordered column-major: `(x - x_min) * (y_max - y_min + 1) + (y - y_min)`.

use anyhow::{Result, ensure};
use byteorder::{BigEndian as BE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use tilecascade_core::{ByteRange, TileKey};

pub const GEMF_VERSION: u32 = 4;
/// Length of one entry in a range's index table.
pub const ENTRY_LENGTH: u64 = 12;
const RANGE_LENGTH: u64 = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GemfSource {
	pub index: u32,
	pub name: String,
}

/// A rectangle of tiles of one source on one zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GemfRange {
	pub zoom: u8,
	pub column_min: u32,
	pub column_max: u32,
	pub row_min: u32,
	pub row_max: u32,
	pub source_index: u32,
	/// Global offset of the range's index table.
	pub offset: u64,
}

impl GemfRange {
	pub fn contains(&self, key: &TileKey) -> bool {
		key.zoom == self.zoom
			&& (self.column_min..=self.column_max).contains(&key.column)
			&& (self.row_min..=self.row_max).contains(&key.row)
	}

	pub fn tile_count(&self) -> u64 {
		u64::from(self.column_max - self.column_min + 1) * u64::from(self.row_max - self.row_min + 1)
	}

	/// Byte range of the index entry for `key`. The key must lie inside the range.
	pub fn entry_range(&self, key: &TileKey) -> ByteRange {
		let height = u64::from(self.row_max - self.row_min + 1);
		let position = u64::from(key.column - self.column_min) * height + u64::from(key.row - self.row_min);
		ByteRange::new(self.offset + position * ENTRY_LENGTH, ENTRY_LENGTH)
	}
}

/// Parsed GEMF header. Ranges are kept sorted by zoom level so lookups only look at the
/// ranges of the requested level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GemfIndex {
	pub version: u32,
	pub tile_size: u32,
	pub sources: Vec<GemfSource>,
	ranges: Vec<GemfRange>,
}

impl GemfIndex {
	pub fn new(tile_size: u32, sources: Vec<GemfSource>, mut ranges: Vec<GemfRange>) -> GemfIndex {
		ranges.sort_by_key(|range| (range.zoom, range.source_index, range.column_min, range.row_min));
		GemfIndex {
			version: GEMF_VERSION,
			tile_size,
			sources,
			ranges,
		}
	}

	pub fn read_from<R: Read>(reader: &mut R) -> Result<GemfIndex> {
		let version = reader.read_u32::<BE>()?;
		ensure!(version == GEMF_VERSION, "unsupported GEMF version {version}");
		let tile_size = reader.read_u32::<BE>()?;

		let source_count = reader.read_u32::<BE>()?;
		let mut sources = Vec::new();
		for _ in 0..source_count {
			let index = reader.read_u32::<BE>()?;
			let length = reader.read_u32::<BE>()?;
			ensure!(length <= 1024, "GEMF source name too long ({length} bytes)");
			let mut name = vec![0; length as usize];
			reader.read_exact(&mut name)?;
			sources.push(GemfSource {
				index,
				name: String::from_utf8(name)?,
			});
		}

		let range_count = reader.read_u32::<BE>()?;
		let mut ranges = Vec::new();
		for _ in 0..range_count {
			let zoom = reader.read_u32::<BE>()?;
			ensure!(zoom <= u32::from(tilecascade_core::MAX_ZOOM), "GEMF range has invalid zoom {zoom}");
			let range = GemfRange {
				zoom: zoom as u8,
				column_min: reader.read_u32::<BE>()?,
				column_max: reader.read_u32::<BE>()?,
				row_min: reader.read_u32::<BE>()?,
				row_max: reader.read_u32::<BE>()?,
				source_index: reader.read_u32::<BE>()?,
				offset: reader.read_u64::<BE>()?,
			};
			ensure!(
				range.column_min <= range.column_max && range.row_min <= range.row_max,
				"GEMF range {range:?} is inverted"
			);
			ranges.push(range);
		}

		let mut index = GemfIndex::new(tile_size, sources, ranges);
		index.version = version;
		Ok(index)
	}

	pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
		writer.write_u32::<BE>(self.version)?;
		writer.write_u32::<BE>(self.tile_size)?;
		writer.write_u32::<BE>(self.sources.len() as u32)?;
		for source in &self.sources {
			writer.write_u32::<BE>(source.index)?;
			writer.write_u32::<BE>(source.name.len() as u32)?;
			writer.write_all(source.name.as_bytes())?;
		}
		writer.write_u32::<BE>(self.ranges.len() as u32)?;
		for range in &self.ranges {
			writer.write_u32::<BE>(u32::from(range.zoom))?;
			writer.write_u32::<BE>(range.column_min)?;
			writer.write_u32::<BE>(range.column_max)?;
			writer.write_u32::<BE>(range.row_min)?;
			writer.write_u32::<BE>(range.row_max)?;
			writer.write_u32::<BE>(range.source_index)?;
			writer.write_u64::<BE>(range.offset)?;
		}
		Ok(())
	}

	/// Size of the serialized header in bytes.
	pub fn byte_length(&self) -> u64 {
		let sources: u64 = self.sources.iter().map(|s| 8 + s.name.len() as u64).sum();
		12 + sources + 4 + self.ranges.len() as u64 * RANGE_LENGTH
	}

	pub fn ranges(&self) -> &[GemfRange] {
		&self.ranges
	}

	pub fn ranges_mut(&mut self) -> &mut [GemfRange] {
		&mut self.ranges
	}

	pub fn source_index(&self, name: &str) -> Option<u32> {
		self.sources.iter().find(|s| s.name == name).map(|s| s.index)
	}

	/// The range holding `key`, restricted to one source if given.
	pub fn find_range(&self, key: &TileKey, source_index: Option<u32>) -> Option<&GemfRange> {
		let start = self.ranges.partition_point(|range| range.zoom < key.zoom);
		self.ranges[start..]
			.iter()
			.take_while(|range| range.zoom == key.zoom)
			.filter(|range| source_index.is_none_or(|index| range.source_index == index))
			.find(|range| range.contains(key))
	}
}
