//! Loads tiles from a directory tree `root/<source>/<zoom>/<column>/<row><extension>`.
//!
//! Files older than the configured maximum age are still served, but marked as expired so the
//! engine keeps looking for a fresher copy. A file that cannot be decoded is deleted.

use super::TileLoader;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
	fs,
	io::ErrorKind,
	path::{Path, PathBuf},
	time::Duration,
};
use tilecascade_core::{Blob, SystemicFailure, TileImage, TileKey, TileSourceDescriptor, systemic_cause};

#[derive(Debug)]
pub struct FileSystemTileLoader {
	name: String,
	root: PathBuf,
	source: TileSourceDescriptor,
	max_age: Duration,
}

impl FileSystemTileLoader {
	pub fn new(root: &Path, source: &TileSourceDescriptor, max_age: Duration) -> Self {
		FileSystemTileLoader {
			name: format!("filesystem:{}", source.name),
			root: root.to_path_buf(),
			source: source.clone(),
			max_age,
		}
	}

	pub fn tile_path(&self, key: &TileKey) -> PathBuf {
		self.root.join(self.source.relative_path(key))
	}
}

fn read_tile_file(root: &Path, path: &Path, max_age: Duration) -> Result<Option<TileImage>> {
	if !root.is_dir() {
		return Err(anyhow::Error::new(SystemicFailure::StorageUnavailable(format!(
			"tile directory {root:?} is not accessible"
		))));
	}

	let data = match fs::read(path) {
		Ok(data) => data,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e).with_context(|| format!("reading {path:?}")),
	};

	let image = match TileImage::decode(&Blob::from(data)) {
		Ok(image) => image,
		Err(err) => {
			if systemic_cause(&err).is_none() {
				log::warn!("deleting undecodable tile file {path:?}");
				if let Err(e) = fs::remove_file(path) {
					log::warn!("could not delete {path:?}: {e}");
				}
			}
			return Err(err.context(format!("decoding {path:?}")));
		}
	};

	let age = fs::metadata(path)
		.and_then(|metadata| metadata.modified())
		.ok()
		.and_then(|modified| modified.elapsed().ok());
	if age.is_some_and(|age| age > max_age) {
		log::trace!("{path:?} is older than {max_age:?}");
		image.set_expired(true);
	}

	Ok(Some(image))
}

#[async_trait]
impl TileLoader for FileSystemTileLoader {
	fn name(&self) -> &str {
		&self.name
	}

	async fn load_tile(&self, key: &TileKey) -> Result<Option<TileImage>> {
		let root = self.root.clone();
		let path = self.tile_path(key);
		let max_age = self.max_age;
		tokio::task::spawn_blocking(move || read_tile_file(&root, &path, max_age)).await?
	}
}
