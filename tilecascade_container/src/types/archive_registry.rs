//! `ArchiveRegistry` opens tile archives by file extension.
//!
//! Built-in openers exist for `gemf` and `mbtiles`/`sqlite`. Additional backends can be
//! registered at runtime.
//!
//! ```no_run
//! use std::path::Path;
//! use tilecascade_container::ArchiveRegistry;
//!
//! let registry = ArchiveRegistry::default();
//! let archive = registry.open(Path::new("/data/maps/berlin.mbtiles")).unwrap();
//! assert_eq!(archive.archive_type(), "mbtiles");
//! ```

use crate::{ArchiveStore, GemfReader, MBTilesReader};
use anyhow::{Context, Result, anyhow};
use std::{collections::HashMap, path::Path, sync::Arc};

type OpenArchive = Box<dyn Fn(&Path) -> Result<Arc<dyn ArchiveStore>> + Send + Sync + 'static>;

/// Maps lowercase file extensions to archive openers.
#[derive(Clone)]
pub struct ArchiveRegistry {
	openers: HashMap<String, Arc<OpenArchive>>,
}

impl ArchiveRegistry {
	pub fn new_empty() -> Self {
		Self {
			openers: HashMap::new(),
		}
	}

	/// Register an opener for a file extension, replacing any previous one.
	pub fn register<F>(&mut self, ext: &str, open: F)
	where
		F: Fn(&Path) -> Result<Arc<dyn ArchiveStore>> + Send + Sync + 'static,
	{
		self.openers.insert(sanitize_extension(ext), Arc::new(Box::new(open)));
	}

	pub fn supports(&self, path: &Path) -> bool {
		extension_of(path).is_some_and(|ext| self.openers.contains_key(&ext))
	}

	/// Registered extensions, sorted.
	pub fn extensions(&self) -> Vec<String> {
		let mut extensions: Vec<String> = self.openers.keys().cloned().collect();
		extensions.sort();
		extensions
	}

	/// Open a single archive with the opener registered for its extension.
	pub fn open(&self, path: &Path) -> Result<Arc<dyn ArchiveStore>> {
		let ext = extension_of(path).with_context(|| format!("archive {path:?} has no file extension"))?;
		let open = self
			.openers
			.get(&ext)
			.ok_or_else(|| anyhow!("no archive backend registered for extension '{ext}' ({path:?})"))?;
		log::debug!("opening {ext} archive {path:?}");
		open(path).with_context(|| format!("opening archive {path:?}"))
	}

	/// Open archives in order. Archives that cannot be opened are skipped with a warning, so a
	/// single broken file does not take the others down.
	pub fn open_all<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Arc<dyn ArchiveStore>> {
		paths
			.iter()
			.filter_map(|path| match self.open(path.as_ref()) {
				Ok(archive) => Some(archive),
				Err(err) => {
					log::warn!("skipping archive: {err:#}");
					None
				}
			})
			.collect()
	}
}

impl Default for ArchiveRegistry {
	fn default() -> Self {
		let mut registry = Self::new_empty();
		registry.register("gemf", |path| Ok(Arc::new(GemfReader::open_path(path)?)));
		registry.register("mbtiles", |path| Ok(Arc::new(MBTilesReader::open_path(path)?)));
		registry.register("sqlite", |path| Ok(Arc::new(MBTilesReader::open_path(path)?)));
		registry
	}
}

fn sanitize_extension(ext: &str) -> String {
	ext.trim().trim_start_matches('.').to_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
	path.extension().and_then(|ext| ext.to_str()).map(sanitize_extension)
}
