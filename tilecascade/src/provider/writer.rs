use anyhow::{Context, Result};
use std::{
	fmt::Debug,
	fs,
	path::{Path, PathBuf},
};
use tilecascade_core::{Blob, TileKey, TileSourceDescriptor};

/// Persists downloaded tiles so that later requests are served locally.
pub trait TileFileCache: Debug + Send + Sync {
	fn save(&self, source: &TileSourceDescriptor, key: &TileKey, data: &Blob) -> Result<()>;
}

/// Writes tiles to `root/<source>/<zoom>/<column>/<row><extension>`.
///
/// Every tile is written to a temporary file first and then renamed, so readers never see a
/// partially written tile.
#[derive(Debug, Clone)]
pub struct FileSystemTileWriter {
	root: PathBuf,
}

impl FileSystemTileWriter {
	pub fn new(root: &Path) -> Self {
		FileSystemTileWriter {
			root: root.to_path_buf(),
		}
	}

	pub fn tile_path(&self, source: &TileSourceDescriptor, key: &TileKey) -> PathBuf {
		self.root.join(source.relative_path(key))
	}
}

impl TileFileCache for FileSystemTileWriter {
	fn save(&self, source: &TileSourceDescriptor, key: &TileKey, data: &Blob) -> Result<()> {
		let path = self.tile_path(source, key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).with_context(|| format!("creating directory {parent:?}"))?;
		}

		let temp = PathBuf::from(format!("{}.tmp", path.display()));
		fs::write(&temp, data.as_slice()).with_context(|| format!("writing {temp:?}"))?;
		fs::rename(&temp, &path).with_context(|| format!("moving {temp:?} to {path:?}"))?;
		log::trace!("saved {key} of '{}' to {path:?}", source.name);
		Ok(())
	}
}
