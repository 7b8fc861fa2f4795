use super::TileLoader;
use anyhow::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tilecascade_container::ArchiveStore;
use tilecascade_core::{SystemicFailure, TileImage, TileKey};

/// Searches a list of opened archives in order and decodes the first hit.
///
/// The archives are shared between all tile sources and all workers.
#[derive(Debug)]
pub struct ArchiveTileLoader {
	name: String,
	archives: Vec<Arc<dyn ArchiveStore>>,
}

impl ArchiveTileLoader {
	pub fn new(archives: Vec<Arc<dyn ArchiveStore>>) -> Self {
		ArchiveTileLoader {
			name: String::from("archive"),
			archives,
		}
	}

	pub fn archive_count(&self) -> usize {
		self.archives.len()
	}
}

#[async_trait]
impl TileLoader for ArchiveTileLoader {
	fn name(&self) -> &str {
		&self.name
	}

	async fn load_tile(&self, key: &TileKey) -> Result<Option<TileImage>> {
		let mut last_error: Option<Error> = None;

		for archive in &self.archives {
			match archive.read_tile(key).await {
				Ok(Some(blob)) => return TileImage::decode(&blob).map(Some),
				Ok(None) => {}
				Err(err) if !archive.is_available() => {
					return Err(err.context(SystemicFailure::StorageUnavailable(archive.name().to_string())));
				}
				Err(err) => {
					log::debug!("{} archive {}: {err:#}", archive.archive_type(), archive.name());
					last_error = Some(err.context(format!("reading {key} from {}", archive.name())));
				}
			}
		}

		match last_error {
			Some(err) => Err(err),
			None => Ok(None),
		}
	}
}
