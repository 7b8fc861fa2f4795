//! Read tiles from a GEMF archive.
//!
//! A GEMF archive is one main file plus optional sibling files `<name>-1`, `<name>-2`, ... Data
//! offsets in the index are global: they count from the start of the main file and continue
//! through the siblings in order. The reader maps every global offset to the file holding it.
//!
//! ```no_run
//! use std::path::Path;
//! use tilecascade_container::{ArchiveStore, GemfReader};
//! use tilecascade_core::TileKey;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = GemfReader::open_path(Path::new("/sdcard/maps/world.gemf"))?;
//!     let tile = reader.read_tile(&TileKey::new(2, 1, 1)?).await?;
//!     println!("{:?}", tile);
//!     Ok(())
//! }
//! ```

use super::index::GemfIndex;
use crate::ArchiveStore;
use anyhow::{Context, Result, ensure};
use async_trait::async_trait;
use byteorder::{BigEndian as BE, ReadBytesExt};
use parking_lot::Mutex;
use std::{
	fmt::Debug,
	fs::File,
	io::{BufReader, Read, Seek, SeekFrom},
	path::{Path, PathBuf},
};
use tilecascade_core::{Blob, ByteRange, TileKey};

/// One physical file of the archive and its position in the global address space.
struct DataFile {
	path: PathBuf,
	start: u64,
	size: u64,
	file: Mutex<File>,
}

impl DataFile {
	fn open(path: PathBuf, start: u64) -> Result<DataFile> {
		let file = File::open(&path).with_context(|| format!("opening GEMF file {path:?}"))?;
		let size = file.metadata()?.len();
		Ok(DataFile {
			path,
			start,
			size,
			file: Mutex::new(file),
		})
	}

	fn end(&self) -> u64 {
		self.start + self.size
	}

	fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let local = range.shifted_backward(self.start);
		let mut buffer = vec![0; local.length as usize];
		let mut file = self.file.lock();
		file
			.seek(SeekFrom::Start(local.offset))
			.with_context(|| format!("seeking to {} in {:?}", local.offset, self.path))?;
		file
			.read_exact(&mut buffer)
			.with_context(|| format!("reading {local} from {:?}", self.path))?;
		Ok(Blob::from(buffer))
	}
}

/// Reader for GEMF archives.
pub struct GemfReader {
	name: String,
	index: GemfIndex,
	files: Vec<DataFile>,
	source_index: Option<u32>,
}

impl GemfReader {
	/// Open a GEMF archive and all its sibling files. Tiles of every source are served.
	pub fn open_path(path: &Path) -> Result<GemfReader> {
		log::debug!("open GEMF {path:?}");
		ensure!(path.is_file(), "GEMF archive {path:?} does not exist");

		let main = DataFile::open(path.to_path_buf(), 0)?;
		let index = {
			let mut file = main.file.lock();
			file.seek(SeekFrom::Start(0))?;
			GemfIndex::read_from(&mut BufReader::new(&mut *file))
				.with_context(|| format!("parsing GEMF header of {path:?}"))?
		};

		let mut files = vec![main];
		for number in 1.. {
			let sibling = PathBuf::from(format!("{}-{number}", path.display()));
			if !sibling.is_file() {
				break;
			}
			let start = files.last().map_or(0, DataFile::end);
			files.push(DataFile::open(sibling, start)?);
		}

		log::debug!(
			"GEMF {path:?}: {} sources, {} ranges, {} files",
			index.sources.len(),
			index.ranges().len(),
			files.len()
		);

		Ok(GemfReader {
			name: path.display().to_string(),
			index,
			files,
			source_index: None,
		})
	}

	/// Open a GEMF archive and serve only the tiles of the named source.
	pub fn open_path_with_source(path: &Path, source: &str) -> Result<GemfReader> {
		let mut reader = GemfReader::open_path(path)?;
		let index = reader.index.source_index(source).with_context(|| {
			let names: Vec<&str> = reader.source_names();
			format!("GEMF archive {path:?} has no source '{source}', only {names:?}")
		})?;
		reader.source_index = Some(index);
		Ok(reader)
	}

	pub fn index(&self) -> &GemfIndex {
		&self.index
	}

	pub fn source_names(&self) -> Vec<&str> {
		self.index.sources.iter().map(|s| s.name.as_str()).collect()
	}

	pub fn file_count(&self) -> usize {
		self.files.len()
	}

	fn read_range(&self, range: &ByteRange) -> Result<Blob> {
		let position = self.files.partition_point(|file| file.end() <= range.offset);
		let file = self
			.files
			.get(position)
			.with_context(|| format!("offset {} lies beyond the end of GEMF archive {}", range.offset, self.name))?;
		ensure!(
			range.end() <= file.end(),
			"range {range:?} spans more than one file of GEMF archive {}",
			self.name
		);
		file.read_range(range)
	}
}

#[async_trait]
impl ArchiveStore for GemfReader {
	fn archive_type(&self) -> &str {
		"gemf"
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn is_available(&self) -> bool {
		self.files.iter().all(|file| file.path.is_file())
	}

	async fn read_tile(&self, key: &TileKey) -> Result<Option<Blob>> {
		let Some(range) = self.index.find_range(key, self.source_index) else {
			log::trace!("{key:?} not in any range of {}", self.name);
			return Ok(None);
		};

		let entry = self.read_range(&range.entry_range(key))?;
		let mut entry = entry.as_slice();
		let offset = entry.read_u64::<BE>()?;
		let length = entry.read_u32::<BE>()?;

		if length == 0 {
			return Ok(None);
		}

		let data = self
			.read_range(&ByteRange::new(offset, u64::from(length)))
			.with_context(|| format!("reading tile {key} from {}", self.name))?;
		Ok(Some(data))
	}
}

impl Debug for GemfReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GemfReader")
			.field("name", &self.name)
			.field("sources", &self.source_names())
			.field("files", &self.files.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{GemfBuilder, png_tile};
	use assert_fs::TempDir;
	use pretty_assertions::assert_eq;

	fn key(zoom: u8, column: u32, row: u32) -> TileKey {
		TileKey::new(zoom, column, row).unwrap()
	}

	#[tokio::test]
	async fn reads_present_and_absent_tiles() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("world.gemf");
		GemfBuilder::new()
			.add_tile("Mapnik", key(2, 1, 1), png_tile([255, 0, 0, 255]))
			.add_tile("Mapnik", key(2, 3, 2), png_tile([0, 255, 0, 255]))
			.write(&path)?;

		let reader = GemfReader::open_path(&path)?;
		assert_eq!(reader.source_names(), vec!["Mapnik"]);
		assert_eq!(reader.read_tile(&key(2, 1, 1)).await?, Some(png_tile([255, 0, 0, 255])));
		assert_eq!(reader.read_tile(&key(2, 3, 2)).await?, Some(png_tile([0, 255, 0, 255])));
		// inside the range rectangle but never written
		assert_eq!(reader.read_tile(&key(2, 2, 1)).await?, None);
		// no range on this level
		assert_eq!(reader.read_tile(&key(5, 0, 0)).await?, None);
		assert!(reader.is_available());
		Ok(())
	}

	#[tokio::test]
	async fn data_spread_over_sibling_files() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("split.gemf");
		let mut builder = GemfBuilder::new().split_files_at(600);
		let keys: Vec<TileKey> = (0..4).flat_map(|x| (0..4).map(move |y| key(2, x, y))).collect();
		for (i, key) in keys.iter().enumerate() {
			builder = builder.add_tile("Mapnik", *key, png_tile([i as u8 * 10, 0, 0, 255]));
		}
		builder.write(&path)?;

		let reader = GemfReader::open_path(&path)?;
		assert!(reader.file_count() > 1);
		for (i, key) in keys.iter().enumerate() {
			assert_eq!(reader.read_tile(key).await?, Some(png_tile([i as u8 * 10, 0, 0, 255])));
		}

		std::fs::remove_file(dir.path().join("split.gemf-1"))?;
		assert!(!reader.is_available());
		Ok(())
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_reads() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("shared.gemf");
		let mut builder = GemfBuilder::new();
		for x in 0..8 {
			for y in 0..8 {
				builder = builder.add_tile("Mapnik", key(3, x, y), png_tile([x as u8, y as u8, 0, 255]));
			}
		}
		builder.write(&path)?;

		let reader = std::sync::Arc::new(GemfReader::open_path(&path)?);
		let mut handles = Vec::new();
		for x in 0..8 {
			let reader = reader.clone();
			handles.push(tokio::spawn(async move {
				for y in 0..8 {
					let tile = reader.read_tile(&key(3, x, y)).await.unwrap();
					assert_eq!(tile, Some(png_tile([x as u8, y as u8, 0, 255])));
				}
			}));
		}
		for handle in handles {
			handle.await?;
		}
		Ok(())
	}

	#[tokio::test]
	async fn preferred_source() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("multi.gemf");
		GemfBuilder::new()
			.add_tile("Mapnik", key(1, 0, 0), png_tile([1, 1, 1, 255]))
			.add_tile("Hills", key(1, 0, 0), png_tile([2, 2, 2, 255]))
			.add_tile("Hills", key(1, 1, 1), png_tile([3, 3, 3, 255]))
			.write(&path)?;

		let hills = GemfReader::open_path_with_source(&path, "Hills")?;
		assert_eq!(hills.read_tile(&key(1, 0, 0)).await?, Some(png_tile([2, 2, 2, 255])));

		let mapnik = GemfReader::open_path_with_source(&path, "Mapnik")?;
		assert_eq!(mapnik.read_tile(&key(1, 1, 1)).await?, None);

		assert!(GemfReader::open_path_with_source(&path, "Topo").is_err());
		Ok(())
	}

	#[test]
	fn missing_and_corrupt_files() -> Result<()> {
		let dir = TempDir::new()?;
		assert!(GemfReader::open_path(&dir.path().join("none.gemf")).is_err());

		let path = dir.path().join("corrupt.gemf");
		std::fs::write(&path, b"definitely not gemf")?;
		assert!(GemfReader::open_path(&path).is_err());
		Ok(())
	}
}
