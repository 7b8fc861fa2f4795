//! Builder for [`TileEngine`] instances.

use super::{ProviderSpec, SourcePipeline, TileEngine};
use anyhow::{Result, ensure};
use std::{collections::HashMap, time::Duration};
use tilecascade_core::TileSourceDescriptor;
use tokio::runtime::Handle;

/// Collects tile sources and their providers before any worker is spawned.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tilecascade::{ProviderSettings, ProviderSpec, TileEngine, NetworkTileLoader, AlwaysOnline};
/// use tilecascade_core::TileSourceDescriptor;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let source = TileSourceDescriptor::new("Local", 0, 14, 256, ".png", &["http://localhost:8080/"]);
///     let network = NetworkTileLoader::new(&source, std::time::Duration::from_secs(5), Arc::new(AlwaysOnline))?;
///     let engine = TileEngine::builder(tokio::runtime::Handle::current())
///         .cache_capacity(64)
///         .source(source, vec![ProviderSpec::new(Arc::new(network), ProviderSettings::new(2, 40))])
///         .build()?;
///     Ok(())
/// }
/// ```
pub struct EngineBuilder {
	handle: Handle,
	cache_capacity: usize,
	zoom_retention: u8,
	systemic_backoff: Duration,
	sources: Vec<(TileSourceDescriptor, Vec<ProviderSpec>)>,
}

impl EngineBuilder {
	pub fn new(handle: Handle) -> Self {
		EngineBuilder {
			handle,
			cache_capacity: 9,
			zoom_retention: 1,
			systemic_backoff: Duration::from_secs(30),
			sources: Vec::new(),
		}
	}

	/// Tiles kept in memory per source.
	#[must_use]
	pub fn cache_capacity(mut self, capacity: usize) -> Self {
		self.cache_capacity = capacity;
		self
	}

	/// Zoom levels around the active one that survive a rescale.
	#[must_use]
	pub fn zoom_retention(mut self, levels: u8) -> Self {
		self.zoom_retention = levels;
		self
	}

	/// How long a provider stays suspended after a systemic failure.
	#[must_use]
	pub fn systemic_backoff(mut self, backoff: Duration) -> Self {
		self.systemic_backoff = backoff;
		self
	}

	/// Add a tile source. Its providers are tried in the given order.
	#[must_use]
	pub fn source(mut self, source: TileSourceDescriptor, providers: Vec<ProviderSpec>) -> Self {
		self.sources.push((source, providers));
		self
	}

	pub fn build(self) -> Result<TileEngine> {
		ensure!(self.cache_capacity > 0, "cache capacity must be > 0");

		let mut pipelines = HashMap::new();
		for (source, providers) in self.sources {
			source.validate()?;
			ensure!(
				!pipelines.contains_key(&source.name),
				"tile source '{}' is defined twice",
				source.name
			);
			log::debug!(
				"source '{}': providers {:?}",
				source.name,
				providers.iter().map(|p| p.loader.name()).collect::<Vec<_>>()
			);
			let name = source.name.clone();
			let pipeline = SourcePipeline::new(
				source,
				self.cache_capacity,
				providers,
				self.systemic_backoff,
				&self.handle,
			);
			pipelines.insert(name, pipeline);
		}

		Ok(TileEngine {
			pipelines,
			handle: self.handle,
			zoom_retention: self.zoom_retention,
		})
	}
}
