use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use tilecascade_core::{SystemicFailure, TileImage, TileKey};

/// Produces decoded tiles from one kind of storage.
///
/// `Ok(None)` means the tile is simply not available here. Errors are per-tile failures unless
/// their chain contains a [`SystemicFailure`].
#[async_trait]
pub trait TileLoader: Debug + Send + Sync {
	fn name(&self) -> &str;

	async fn load_tile(&self, key: &TileKey) -> Result<Option<TileImage>>;
}

/// How a provider finished with a tile.
#[derive(Debug, Clone)]
pub enum TileOutcome {
	Loaded(TileImage),
	/// The loader has no such tile.
	NotFound,
	/// The loader failed for this tile only.
	Failed,
	/// The task was discarded because the provider hit a systemic failure.
	Drained,
	/// The task was pushed out of a full queue by a newer request.
	Dropped,
}

/// Receives the results of a provider's workers.
///
/// Called from worker tasks without any provider lock held.
pub trait ProviderListener: Send + Sync {
	fn on_tile_outcome(&self, provider: usize, key: TileKey, outcome: TileOutcome);

	fn on_systemic_failure(&self, _provider: usize, _failure: &SystemicFailure) {}
}
