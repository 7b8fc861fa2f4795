//! Downloads tiles from the mirrors of a [`TileSourceDescriptor`].
//!
//! Each request goes to a randomly chosen mirror. Connection failures (unknown host, no route,
//! refused) are systemic, HTTP errors and undecodable bodies concern only the tile. Successful
//! downloads are written through to an optional [`TileFileCache`].

use super::{NetworkAvailability, TileFileCache, TileLoader};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::{fmt::Debug, sync::Arc, time::Duration};
use tilecascade_core::{Blob, SystemicFailure, TileImage, TileKey, TileSourceDescriptor};

#[derive(Debug)]
pub struct NetworkTileLoader {
	name: String,
	source: TileSourceDescriptor,
	client: Client,
	availability: Arc<dyn NetworkAvailability>,
	file_cache: Option<Arc<dyn TileFileCache>>,
}

impl NetworkTileLoader {
	pub fn new(
		source: &TileSourceDescriptor,
		timeout: Duration,
		availability: Arc<dyn NetworkAvailability>,
	) -> Result<Self> {
		let client = Client::builder()
			.timeout(timeout)
			.tcp_keepalive(Duration::from_secs(600))
			.build()
			.context("building HTTP client")?;

		Ok(NetworkTileLoader {
			name: format!("network:{}", source.name),
			source: source.clone(),
			client,
			availability,
			file_cache: None,
		})
	}

	/// Save every downloaded tile to `file_cache`.
	#[must_use]
	pub fn with_file_cache(mut self, file_cache: Arc<dyn TileFileCache>) -> Self {
		self.file_cache = Some(file_cache);
		self
	}

	async fn download(&self, url: &str) -> Result<Blob> {
		let response = match self.client.get(url).send().await {
			Ok(response) => response,
			Err(e) if e.is_connect() => {
				return Err(anyhow::Error::new(e).context(SystemicFailure::Unreachable(url.to_string())));
			}
			Err(e) => return Err(e).with_context(|| format!("requesting {url}")),
		};

		if response.status() != StatusCode::OK {
			bail!("{url} returned HTTP {}", response.status());
		}

		let bytes = response
			.bytes()
			.await
			.with_context(|| format!("reading response body of {url}"))?;
		Ok(Blob::from(bytes.to_vec()))
	}

	async fn write_through(&self, key: &TileKey, blob: Blob) {
		let Some(file_cache) = self.file_cache.clone() else {
			return;
		};
		let source = self.source.clone();
		let key = *key;
		let saved = tokio::task::spawn_blocking(move || file_cache.save(&source, &key, &blob)).await;
		match saved {
			Ok(Ok(())) => {}
			Ok(Err(err)) => log::warn!("could not save {key} of '{}': {err:#}", self.source.name),
			Err(err) => log::warn!("could not save {key} of '{}': {err}", self.source.name),
		}
	}
}

#[async_trait]
impl TileLoader for NetworkTileLoader {
	fn name(&self) -> &str {
		&self.name
	}

	async fn load_tile(&self, key: &TileKey) -> Result<Option<TileImage>> {
		if !self.availability.is_network_available() {
			log::debug!("{}: offline, skipping {key}", self.name);
			return Ok(None);
		}

		let url = self.source.tile_url(key)?;
		log::trace!("{}: downloading {url}", self.name);
		let blob = self.download(&url).await?;
		let image = TileImage::decode(&blob).with_context(|| format!("decoding {url}"))?;
		self.write_through(key, blob).await;
		Ok(Some(image))
	}
}
