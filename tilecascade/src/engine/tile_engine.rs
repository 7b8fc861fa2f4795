use super::{EngineBuilder, ProviderSpec, SourcePipeline, TileCallback};
use crate::{
	cache::TileCache,
	config::ResolverConfig,
	provider::{
		ArchiveTileLoader, FileSystemTileLoader, FileSystemTileWriter, NetworkAvailability, NetworkTileLoader,
		TaskPriority, TileFileCache, TileLoader,
	},
};
use anyhow::{Context, Result, ensure};
use std::{collections::HashMap, sync::Arc};
use tilecascade_container::ArchiveRegistry;
use tilecascade_core::{MAX_ZOOM, TileImage, TileKey, TileRange, TileSourceDescriptor};
use tokio::{runtime::Handle, sync::oneshot, task::JoinHandle};

/// Resolves tiles of several sources through their caches and providers.
///
/// Callers never see errors: every request ends with `Some(image)` or `None`.
#[derive(Debug)]
pub struct TileEngine {
	pub(super) pipelines: HashMap<String, Arc<SourcePipeline>>,
	pub(super) handle: Handle,
	pub(super) zoom_retention: u8,
}

impl TileEngine {
	pub fn builder(handle: Handle) -> EngineBuilder {
		EngineBuilder::new(handle)
	}

	/// Build an engine with a filesystem, an archive and a network provider per source, as far as
	/// the configuration provides them.
	///
	/// Archives are opened once and shared by all sources. Archives that cannot be opened are
	/// skipped.
	pub fn from_config(
		config: &ResolverConfig,
		handle: Handle,
		availability: Arc<dyn NetworkAvailability>,
	) -> Result<TileEngine> {
		config.validate()?;

		let archives = ArchiveRegistry::default().open_all(&config.archives);
		let archive_loader: Option<Arc<dyn TileLoader>> = if archives.is_empty() {
			None
		} else {
			Some(Arc::new(ArchiveTileLoader::new(archives)))
		};
		let file_cache: Option<Arc<dyn TileFileCache>> = config
			.tile_dir
			.as_deref()
			.map(|dir| Arc::new(FileSystemTileWriter::new(dir)) as Arc<dyn TileFileCache>);

		let mut builder = TileEngine::builder(handle)
			.cache_capacity(config.cache_capacity)
			.zoom_retention(config.zoom_retention)
			.systemic_backoff(config.systemic_backoff());

		for source in &config.sources {
			let mut providers = Vec::new();

			if let Some(dir) = &config.tile_dir {
				let loader = FileSystemTileLoader::new(dir, source, config.max_cached_file_age());
				providers.push(ProviderSpec::new(Arc::new(loader), config.filesystem));
			}

			if let Some(loader) = &archive_loader {
				providers.push(ProviderSpec::new(loader.clone(), config.archive));
			}

			if !source.base_urls.is_empty() {
				let mut loader = NetworkTileLoader::new(source, config.request_timeout(), availability.clone())
					.with_context(|| format!("creating network provider of '{}'", source.name))?;
				if let Some(file_cache) = &file_cache {
					loader = loader.with_file_cache(file_cache.clone());
				}
				providers.push(ProviderSpec::new(Arc::new(loader), config.network));
			}

			builder = builder.source(source.clone(), providers);
		}

		builder.build()
	}

	fn pipeline(&self, source: &str) -> Result<&Arc<SourcePipeline>> {
		self
			.pipelines
			.get(source)
			.with_context(|| format!("unknown tile source '{source}'"))
	}

	/// Descriptors of all sources, sorted by name.
	pub fn sources(&self) -> Vec<&TileSourceDescriptor> {
		let mut sources: Vec<&TileSourceDescriptor> = self.pipelines.values().map(|p| p.source()).collect();
		sources.sort_by(|a, b| a.name.cmp(&b.name));
		sources
	}

	pub fn source(&self, name: &str) -> Result<&TileSourceDescriptor> {
		Ok(self.pipeline(name)?.source())
	}

	/// The memory cache of a source.
	pub fn cache(&self, source: &str) -> Result<&TileCache> {
		Ok(self.pipeline(source)?.cache())
	}

	/// Request a tile with normal priority. See [`request_with_priority`](Self::request_with_priority).
	pub fn request<F>(&self, key: TileKey, source: &str, callback: F)
	where
		F: FnOnce(TileKey, Option<TileImage>) + Send + 'static,
	{
		self.request_with_priority(key, source, TaskPriority::Normal, callback);
	}

	/// Request a tile.
	///
	/// A fresh cache hit calls `callback` before this returns. Otherwise `callback` is called
	/// later from a worker task, once, unless the request is cancelled. Concurrent requests for
	/// the same tile share a single resolution.
	pub fn request_with_priority<F>(&self, key: TileKey, source: &str, priority: TaskPriority, callback: F)
	where
		F: FnOnce(TileKey, Option<TileImage>) + Send + 'static,
	{
		let callback: TileCallback = Box::new(callback);
		match self.pipeline(source) {
			Ok(pipeline) => pipeline.request(key, priority, callback),
			Err(err) => {
				log::warn!("{err}");
				callback(key, None);
			}
		}
	}

	/// Request a tile and wait for the result.
	pub async fn resolve(&self, key: TileKey, source: &str) -> Option<TileImage> {
		let (sender, receiver) = oneshot::channel();
		self.request(key, source, move |_, image| {
			// the receiver is gone only if this future was dropped
			let _ = sender.send(image);
		});
		receiver.await.ok().flatten()
	}

	/// Withdraw interest in a tile. A queued task is removed. A running one completes and its
	/// result is cached, but no callback is called.
	pub fn cancel(&self, key: &TileKey, source: &str) -> bool {
		self.pipeline(source).is_ok_and(|pipeline| pipeline.cancel(key))
	}

	/// Cached tile without touching its recency.
	pub fn cached(&self, key: &TileKey, source: &str) -> Option<TileImage> {
		self.pipeline(source).ok()?.cache().peek(key)
	}

	/// Grow every source's cache. Smaller values are ignored.
	pub fn grow_cache(&self, capacity: usize) {
		for pipeline in self.pipelines.values() {
			pipeline.cache().grow_capacity(capacity);
		}
	}

	/// React to a change of the active zoom level without blocking.
	///
	/// In the background, placeholders for the `viewport` tiles are derived from cached tiles of
	/// `previous_zoom`, and cached tiles and pending requests outside the retention window around
	/// `viewport.zoom` are dropped. The returned handle yields the number of placeholders.
	pub fn rescale(&self, source: &str, previous_zoom: u8, viewport: TileRange) -> Result<JoinHandle<usize>> {
		ensure!(previous_zoom <= MAX_ZOOM, "zoom ({previous_zoom}) must be <= {MAX_ZOOM}");
		let pipeline = self.pipeline(source)?.clone();
		let retention = self.zoom_retention;
		Ok(self
			.handle
			.spawn_blocking(move || pipeline.rescale(previous_zoom, &viewport, retention)))
	}

	/// Let suspended providers accept work again.
	pub fn reset_providers(&self) {
		for pipeline in self.pipelines.values() {
			pipeline.reset_providers();
		}
	}

	/// Number of unresolved requests of a source.
	pub fn in_flight_len(&self, source: &str) -> usize {
		self.pipeline(source).map_or(0, |pipeline| pipeline.in_flight_len())
	}

	/// Whether any provider of the source is suspended after a systemic failure.
	pub fn is_suspended(&self, source: &str) -> bool {
		self
			.pipeline(source)
			.is_ok_and(|pipeline| pipeline.providers().iter().any(|p| p.is_suspended()))
	}

	/// Stop all workers. Pending requests complete with their fallback result or `None`.
	pub fn shutdown(&self) {
		log::debug!("shutting down tile engine");
		for pipeline in self.pipelines.values() {
			pipeline.shutdown();
		}
	}
}
