use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::{
	collections::HashSet,
	fs::File,
	io::{BufReader, Read},
	path::{Path, PathBuf},
	time::Duration,
};
use tilecascade_core::TileSourceDescriptor;

/// Worker pool size and queue bound of one provider kind.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
	/// Number of workers resolving tiles concurrently.
	pub workers: usize,
	/// Maximum number of queued tasks. When full, the least recently requested task is dropped.
	pub queue_capacity: usize,
}

impl ProviderSettings {
	pub const fn new(workers: usize, queue_capacity: usize) -> Self {
		Self {
			workers,
			queue_capacity,
		}
	}

	fn validate(&self, kind: &str) -> Result<()> {
		ensure!(self.workers > 0, "{kind}.workers must be > 0");
		ensure!(self.queue_capacity > 0, "{kind}.queue_capacity must be > 0");
		Ok(())
	}
}

/// Configuration of a tile resolution engine.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
	/// Number of decoded tiles kept in memory per tile source.
	pub cache_capacity: usize,

	/// Zoom levels around the active one whose tiles survive a rescale.
	pub zoom_retention: u8,

	/// Workers and queue bound for the filesystem tile cache provider.
	pub filesystem: ProviderSettings,

	/// Workers and queue bound for the archive provider.
	pub archive: ProviderSettings,

	/// Workers and queue bound for the network provider.
	pub network: ProviderSettings,

	/// Timeout of a single tile download.
	pub request_timeout_secs: u64,

	/// Tiles in the filesystem cache older than this are served but marked as expired.
	pub max_cached_file_age_secs: u64,

	/// How long a provider refuses work after a systemic failure.
	pub systemic_backoff_secs: u64,

	/// Root directory of the filesystem tile cache. Downloads are written through to it.
	pub tile_dir: Option<PathBuf>,

	/// Archive files (GEMF, MBTiles) searched in this order.
	pub archives: Vec<PathBuf>,

	/// Tile sources to serve.
	pub sources: Vec<TileSourceDescriptor>,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			cache_capacity: 9,
			zoom_retention: 1,
			filesystem: ProviderSettings::new(8, 40),
			archive: ProviderSettings::new(8, 40),
			network: ProviderSettings::new(2, 40),
			request_timeout_secs: 10,
			max_cached_file_age_secs: 7 * 24 * 60 * 60,
			systemic_backoff_secs: 30,
			tile_dir: None,
			archives: Vec::new(),
			sources: TileSourceDescriptor::builtin(),
		}
	}
}

impl ResolverConfig {
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		let config: ResolverConfig = serde_yaml_ng::from_reader(reader)?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		let config: ResolverConfig = serde_yaml_ng::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Parse a YAML file. Relative `tile_dir` and `archives` paths are resolved against the
	/// directory of the file.
	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("opening config file {path:?}"))?;
		let mut config =
			ResolverConfig::from_reader(BufReader::new(file)).with_context(|| format!("parsing config file {path:?}"))?;
		if let Some(base) = path.parent() {
			config.resolve_paths(base);
		}
		Ok(config)
	}

	pub fn resolve_paths(&mut self, base: &Path) {
		if let Some(dir) = &self.tile_dir {
			self.tile_dir = Some(base.join(dir));
		}
		for archive in &mut self.archives {
			*archive = base.join(&*archive);
		}
	}

	pub fn validate(&self) -> Result<()> {
		ensure!(self.cache_capacity > 0, "cache_capacity must be > 0");
		self.filesystem.validate("filesystem")?;
		self.archive.validate("archive")?;
		self.network.validate("network")?;
		ensure!(self.request_timeout_secs > 0, "request_timeout_secs must be > 0");

		let mut names = HashSet::new();
		for source in &self.sources {
			source.validate()?;
			ensure!(names.insert(&source.name), "tile source '{}' is defined twice", source.name);
		}
		Ok(())
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn max_cached_file_age(&self) -> Duration {
		Duration::from_secs(self.max_cached_file_age_secs)
	}

	pub fn systemic_backoff(&self) -> Duration {
		Duration::from_secs(self.systemic_backoff_secs)
	}
}
