//! Fixture builders for archive tests.
//!
//! Compiled for this crate's own tests and, with the `test` feature, for downstream crates.

use crate::{GemfIndex, GemfRange, GemfSource};
use anyhow::{Result, ensure};
use byteorder::{BigEndian as BE, WriteBytesExt};
use r2d2_sqlite::rusqlite::{Connection, params};
use std::{collections::BTreeMap, fs, path::Path};
use tilecascade_core::{Blob, TileImage, TileKey};

/// A 4x4 PNG of a single colour.
#[must_use]
pub fn png_tile(rgba: [u8; 4]) -> Blob {
	TileImage::filled(4, rgba).encode_png().expect("encoding a test tile")
}

/// Writes GEMF archives, optionally spreading tile data over sibling files.
#[derive(Default)]
pub struct GemfBuilder {
	sources: Vec<(String, BTreeMap<TileKey, Blob>)>,
	split_at: Option<u64>,
}

impl GemfBuilder {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a new sibling file whenever the current one would grow beyond `bytes`.
	#[must_use]
	pub fn split_files_at(mut self, bytes: u64) -> Self {
		self.split_at = Some(bytes);
		self
	}

	#[must_use]
	pub fn add_tile(mut self, source: &str, key: TileKey, blob: Blob) -> Self {
		let position = match self.sources.iter().position(|(name, _)| name == source) {
			Some(position) => position,
			None => {
				self.sources.push((source.to_string(), BTreeMap::new()));
				self.sources.len() - 1
			}
		};
		self.sources[position].1.insert(key, blob);
		self
	}

	pub fn write(&self, path: &Path) -> Result<()> {
		ensure!(!self.sources.is_empty(), "a GEMF archive needs at least one tile");

		let mut sources = Vec::new();
		let mut ranges = Vec::new();
		for (source_index, (name, tiles)) in self.sources.iter().enumerate() {
			sources.push(GemfSource {
				index: source_index as u32,
				name: name.clone(),
			});
			let mut per_zoom: BTreeMap<u8, Vec<&TileKey>> = BTreeMap::new();
			for key in tiles.keys() {
				per_zoom.entry(key.zoom).or_default().push(key);
			}
			for (zoom, keys) in per_zoom {
				ranges.push(GemfRange {
					zoom,
					column_min: keys.iter().map(|k| k.column).min().unwrap_or(0),
					column_max: keys.iter().map(|k| k.column).max().unwrap_or(0),
					row_min: keys.iter().map(|k| k.row).min().unwrap_or(0),
					row_max: keys.iter().map(|k| k.row).max().unwrap_or(0),
					source_index: source_index as u32,
					offset: 0,
				});
			}
		}

		let mut index = GemfIndex::new(256, sources, ranges);
		let mut position = index.byte_length();
		for range in index.ranges_mut() {
			range.offset = position;
			position += range.tile_count() * 12;
		}

		let mut tables = Vec::new();
		let mut files: Vec<Vec<u8>> = vec![Vec::new()];
		let mut file_length = position;
		for range in index.ranges() {
			let tiles = &self.sources[range.source_index as usize].1;
			for column in range.column_min..=range.column_max {
				for row in range.row_min..=range.row_max {
					let key = TileKey::new(range.zoom, column, row)?;
					let Some(blob) = tiles.get(&key) else {
						tables.write_u64::<BE>(0)?;
						tables.write_u32::<BE>(0)?;
						continue;
					};
					if self
						.split_at
						.is_some_and(|max| file_length > 0 && file_length + blob.len() > max)
					{
						files.push(Vec::new());
						file_length = 0;
					}
					tables.write_u64::<BE>(position)?;
					tables.write_u32::<BE>(blob.len() as u32)?;
					files.last_mut().expect("at least one file").extend_from_slice(blob.as_slice());
					position += blob.len();
					file_length += blob.len();
				}
			}
		}

		let mut main = Vec::new();
		index.write_to(&mut main)?;
		main.extend_from_slice(&tables);
		main.extend_from_slice(&files[0]);
		fs::write(path, main)?;
		for (number, data) in files.iter().enumerate().skip(1) {
			fs::write(format!("{}-{number}", path.display()), data)?;
		}
		Ok(())
	}
}

/// Create an MBTiles database holding `tiles`, addressed top-down like [`TileKey`].
pub fn write_mbtiles(path: &Path, tiles: &[(TileKey, Blob)]) -> Result<()> {
	let rows: Vec<(u8, u32, u32, Blob)> = tiles
		.iter()
		.map(|(key, blob)| (key.zoom, key.column, key.flipped_row(), blob.clone()))
		.collect();
	write_mbtiles_rows(path, &rows)
}

/// Create an MBTiles database from raw `(zoom_level, tile_column, tile_row, tile_data)` rows.
pub fn write_mbtiles_rows(path: &Path, rows: &[(u8, u32, u32, Blob)]) -> Result<()> {
	let mut conn = Connection::open(path)?;
	conn.execute_batch(
		"CREATE TABLE metadata (name TEXT, value TEXT, UNIQUE (name));
		CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB, UNIQUE (zoom_level, tile_column, tile_row));
		INSERT INTO metadata (name, value) VALUES ('format', 'png');",
	)?;
	let transaction = conn.transaction()?;
	for (zoom, column, row, blob) in rows {
		transaction.execute(
			"INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
			params![zoom, column, row, blob.as_slice()],
		)?;
	}
	transaction.commit()?;
	Ok(())
}
