//! Read tiles from an MBTiles (SQLite) database.
//!
//! Tiles live in a relation `tiles (zoom_level, tile_column, tile_row, tile_data)`. MBTiles counts
//! rows from the bottom (TMS), so the reader queries `tile_row = 2^zoom - 1 - row` and callers
//! keep addressing tiles top-down.
//!
//! ```no_run
//! use std::path::Path;
//! use tilecascade_container::{ArchiveStore, MBTilesReader};
//! use tilecascade_core::TileKey;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = MBTilesReader::open_path(Path::new("/data/berlin.mbtiles"))?;
//!     // queries tile_row = 6
//!     let tile = reader.read_tile(&TileKey::new(3, 2, 1)?).await?;
//!     println!("{tile:?}");
//!     Ok(())
//! }
//! ```

use crate::ArchiveStore;
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::{
	SqliteConnectionManager,
	rusqlite::{OpenFlags, OptionalExtension, params},
};
use std::path::{Path, PathBuf};
use tilecascade_core::{Blob, TileKey};

/// Reader for MBTiles containers, opened read-only.
pub struct MBTilesReader {
	name: String,
	path: PathBuf,
	pool: Pool<SqliteConnectionManager>,
}

impl MBTilesReader {
	/// Open an MBTiles database.
	///
	/// # Errors
	/// Returns an error if the file does not exist, is not an SQLite database or has no `tiles`
	/// table or view.
	pub fn open_path(path: &Path) -> Result<MBTilesReader> {
		log::debug!("open MBTiles {path:?}");
		ensure!(path.is_file(), "file {path:?} does not exist");

		let manager = SqliteConnectionManager::file(path)
			.with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX);
		let pool = Pool::builder()
			.max_size(10)
			.build(manager)
			.with_context(|| format!("opening SQLite database {path:?}"))?;

		let reader = MBTilesReader {
			name: path.display().to_string(),
			path: path.to_path_buf(),
			pool,
		};

		let tables: u32 = reader.pool.get()?.query_row(
			"SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = 'tiles'",
			[],
			|row| row.get(0),
		)?;
		ensure!(tables == 1, "{path:?} has no 'tiles' table");

		Ok(reader)
	}

	/// Lowest and highest zoom level stored, `None` for an empty database.
	pub fn zoom_range(&self) -> Result<Option<(u8, u8)>> {
		let conn = self.pool.get()?;
		let range: (Option<u8>, Option<u8>) = conn.query_row(
			"SELECT MIN(zoom_level), MAX(zoom_level) FROM tiles",
			[],
			|row| Ok((row.get(0)?, row.get(1)?)),
		)?;
		Ok(match range {
			(Some(min), Some(max)) => Some((min, max)),
			_ => None,
		})
	}

	pub fn tile_count(&self) -> Result<u64> {
		let conn = self.pool.get()?;
		let count: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
		Ok(u64::try_from(count)?)
	}
}

#[async_trait]
impl ArchiveStore for MBTilesReader {
	fn archive_type(&self) -> &str {
		"mbtiles"
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn is_available(&self) -> bool {
		self.path.is_file()
	}

	async fn read_tile(&self, key: &TileKey) -> Result<Option<Blob>> {
		log::trace!("read tile {key:?} from {}", self.name);

		let conn = self.pool.get()?;
		let mut stmt = conn
			.prepare_cached("SELECT tile_data FROM tiles WHERE tile_column = ?1 AND tile_row = ?2 AND zoom_level = ?3")?;
		let data = stmt
			.query_row(params![key.column, key.flipped_row(), key.zoom], |row| {
				row.get::<_, Vec<u8>>(0)
			})
			.optional()
			.with_context(|| format!("querying tile {key} from {}", self.name))?;

		Ok(data.map(Blob::from))
	}
}

impl std::fmt::Debug for MBTilesReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MBTilesReader").field("name", &self.name).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{png_tile, write_mbtiles, write_mbtiles_rows};
	use assert_fs::TempDir;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	#[tokio::test]
	async fn queries_flipped_row() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("flip.mbtiles");
		// stored with the bottom-up row convention
		write_mbtiles_rows(&path, &[(3, 2, 6, Blob::from(b"row six")), (3, 2, 1, Blob::from(b"row one"))])?;

		let reader = MBTilesReader::open_path(&path)?;
		let key = TileKey::new(3, 2, 1)?;
		assert_eq!(reader.read_tile(&key).await?, Some(Blob::from(b"row six")));
		assert_eq!(reader.read_tile(&TileKey::new(3, 2, 6)?).await?, Some(Blob::from(b"row one")));
		Ok(())
	}

	#[rstest]
	#[case(0, 0, 0)]
	#[case(4, 9, 3)]
	#[case(12, 2200, 1343)]
	#[tokio::test]
	async fn written_tiles_read_back(#[case] zoom: u8, #[case] column: u32, #[case] row: u32) -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("tiles.mbtiles");
		let key = TileKey::new(zoom, column, row)?;
		write_mbtiles(&path, &[(key, png_tile([9, 8, 7, 255]))])?;

		let reader = MBTilesReader::open_path(&path)?;
		assert_eq!(reader.read_tile(&key).await?, Some(png_tile([9, 8, 7, 255])));
		assert_eq!(reader.zoom_range()?, Some((zoom, zoom)));
		assert_eq!(reader.tile_count()?, 1);
		Ok(())
	}

	#[tokio::test]
	async fn absent_tile_is_none() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("empty.mbtiles");
		write_mbtiles(&path, &[])?;

		let reader = MBTilesReader::open_path(&path)?;
		assert_eq!(reader.read_tile(&TileKey::new(1, 1, 1)?).await?, None);
		assert_eq!(reader.zoom_range()?, None);
		Ok(())
	}

	#[test]
	fn rejects_non_mbtiles() -> Result<()> {
		let dir = TempDir::new()?;
		assert!(MBTilesReader::open_path(&dir.path().join("missing.mbtiles")).is_err());

		let path = dir.path().join("other.sqlite");
		r2d2_sqlite::rusqlite::Connection::open(&path)?.execute_batch("CREATE TABLE other (id INTEGER);")?;
		assert!(MBTilesReader::open_path(&path).is_err());
		Ok(())
	}
}
