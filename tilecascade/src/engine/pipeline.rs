//! Resolution state of one tile source: its cache, its providers and the in-flight table.
//!
//! A request first looks at the cache. On a miss it either attaches to the in-flight request for
//! the same key or creates one and submits the key to the first provider. Every provider outcome
//! moves the request's cursor forward until a provider delivers a fresh tile or the providers are
//! exhausted. Expired tiles are cached and remembered as the fallback result.

use super::rescale::{derive_placeholder, placeholder_keys};
use crate::{
	cache::TileCache,
	config::ProviderSettings,
	provider::{ProviderListener, ProviderPool, SubmitOutcome, TaskPriority, TileLoader, TileOutcome},
};
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	fmt::{self, Debug},
	sync::{Arc, Weak},
	time::Duration,
};
use tilecascade_core::{SystemicFailure, TileImage, TileKey, TileRange, TileSourceDescriptor};
use tokio::runtime::Handle;

/// Receives the result of a tile request. Called at most once, possibly on a worker task.
pub type TileCallback = Box<dyn FnOnce(TileKey, Option<TileImage>) + Send>;

/// A loader and the pool settings it runs with.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
	pub loader: Arc<dyn TileLoader>,
	pub settings: ProviderSettings,
}

impl ProviderSpec {
	pub fn new(loader: Arc<dyn TileLoader>, settings: ProviderSettings) -> Self {
		ProviderSpec { loader, settings }
	}
}

struct InFlight {
	cursor: usize,
	priority: TaskPriority,
	callbacks: Vec<TileCallback>,
	stale: Option<TileImage>,
}

pub(crate) struct SourcePipeline {
	source: TileSourceDescriptor,
	cache: TileCache,
	providers: Vec<ProviderPool>,
	in_flight: Mutex<HashMap<TileKey, InFlight>>,
}

impl SourcePipeline {
	pub fn new(
		source: TileSourceDescriptor,
		cache_capacity: usize,
		providers: Vec<ProviderSpec>,
		backoff: Duration,
		handle: &Handle,
	) -> Arc<SourcePipeline> {
		Arc::new_cyclic(|pipeline: &Weak<SourcePipeline>| {
			let listener: Weak<dyn ProviderListener> = pipeline.clone();
			let providers = providers
				.into_iter()
				.enumerate()
				.map(|(index, spec)| {
					ProviderPool::new(index, spec.loader, spec.settings, backoff, listener.clone(), handle)
				})
				.collect();
			SourcePipeline {
				source,
				cache: TileCache::new(cache_capacity),
				providers,
				in_flight: Mutex::new(HashMap::new()),
			}
		})
	}

	pub fn source(&self) -> &TileSourceDescriptor {
		&self.source
	}

	pub fn cache(&self) -> &TileCache {
		&self.cache
	}

	pub fn providers(&self) -> &[ProviderPool] {
		&self.providers
	}

	pub fn in_flight_len(&self) -> usize {
		self.in_flight.lock().len()
	}

	pub fn request(&self, key: TileKey, priority: TaskPriority, callback: TileCallback) {
		if !self.source.supports_zoom(key.zoom) {
			log::debug!("'{}' has no tiles on zoom level {}", self.source.name, key.zoom);
			callback(key, None);
			return;
		}

		let mut stale = None;
		if let Some(image) = self.cache.get(&key) {
			if !image.is_expired() {
				callback(key, Some(image));
				return;
			}
			stale = Some(image);
		}

		let mut in_flight = self.in_flight.lock();
		// a request may have completed between the cache lookup and taking the lock
		if let Some(image) = self.cache.peek(&key) {
			if !image.is_expired() {
				drop(in_flight);
				callback(key, Some(image));
				return;
			}
			stale = Some(image);
		}
		if let Some(entry) = in_flight.get_mut(&key) {
			entry.callbacks.push(callback);
			if entry.stale.is_none() {
				entry.stale = stale;
			}
			if priority > entry.priority {
				entry.priority = priority;
				let cursor = entry.cursor;
				drop(in_flight);
				if let Some(provider) = self.providers.get(cursor) {
					provider.submit(key, priority);
				}
			}
			return;
		}

		in_flight.insert(
			key,
			InFlight {
				cursor: 0,
				priority,
				callbacks: vec![callback],
				stale,
			},
		);
		drop(in_flight);
		self.dispatch(key, 0);
	}

	/// Submit `key` to the first provider from `cursor` on that accepts it.
	fn dispatch(&self, key: TileKey, mut cursor: usize) {
		loop {
			let Some(provider) = self.providers.get(cursor) else {
				log::debug!("no provider of '{}' could deliver {key}", self.source.name);
				self.complete(key, None);
				return;
			};

			let priority = {
				let mut in_flight = self.in_flight.lock();
				let Some(entry) = in_flight.get_mut(&key) else {
					return;
				};
				entry.cursor = cursor;
				entry.priority
			};

			match provider.submit(key, priority) {
				SubmitOutcome::Queued => return,
				SubmitOutcome::Rejected => cursor += 1,
			}
		}
	}

	/// Remove the in-flight request and deliver `image`, or the stale fallback, to every caller.
	fn complete(&self, key: TileKey, image: Option<TileImage>) {
		let Some(entry) = self.in_flight.lock().remove(&key) else {
			return;
		};
		let result = image.or(entry.stale);
		for callback in entry.callbacks {
			callback(key, result.clone());
		}
	}

	fn store(&self, key: TileKey, image: &TileImage) {
		if image.is_expired() && self.cache.peek(&key).is_some_and(|cached| !cached.is_expired()) {
			return;
		}
		self.cache.put(key, image.clone());
	}

	/// Forget the request for `key`. Its callbacks are dropped without being called.
	pub fn cancel(&self, key: &TileKey) -> bool {
		let Some(entry) = self.in_flight.lock().remove(key) else {
			return false;
		};
		if let Some(provider) = self.providers.get(entry.cursor) {
			provider.cancel(key);
		}
		log::trace!("cancelled {key} of '{}'", self.source.name);
		true
	}

	/// Cache placeholders for the viewport derived from tiles of `previous_zoom`, then drop
	/// cached tiles and pending requests more than `retention` levels away from the viewport.
	///
	/// Returns the number of placeholders created.
	pub fn rescale(&self, previous_zoom: u8, viewport: &TileRange, retention: u8) -> usize {
		let zoom = viewport.zoom;

		let placeholders: Vec<(TileKey, TileImage)> = if zoom == previous_zoom {
			Vec::new()
		} else {
			placeholder_keys(&self.cache.keys(), previous_zoom, viewport)
				.into_iter()
				.filter(|key| !self.cache.contains(key))
				.filter_map(|key| {
					derive_placeholder(&self.cache, &key, previous_zoom, self.source.tile_size).map(|image| (key, image))
				})
				.take(self.cache.capacity())
				.collect()
		};

		let evicted = self
			.cache
			.evict_where(|key, _| key.zoom.abs_diff(zoom) > retention);

		let stale_requests: Vec<TileKey> = self
			.in_flight
			.lock()
			.keys()
			.filter(|key| key.zoom.abs_diff(zoom) > retention)
			.copied()
			.collect();
		for key in &stale_requests {
			self.cancel(key);
		}

		let derived = placeholders.len();
		for (key, image) in placeholders {
			self.cache.put(key, image.into_expired());
		}

		log::debug!(
			"rescaled '{}' from zoom {previous_zoom} to {zoom}: {derived} placeholders, {evicted} evicted, {} requests cancelled",
			self.source.name,
			stale_requests.len()
		);
		derived
	}

	pub fn reset_providers(&self) {
		for provider in &self.providers {
			provider.reset();
		}
	}

	/// Stop all providers and complete every pending request with its fallback result.
	pub fn shutdown(&self) {
		for provider in &self.providers {
			provider.shutdown();
		}
		let keys: Vec<TileKey> = self.in_flight.lock().keys().copied().collect();
		for key in keys {
			self.complete(key, None);
		}
	}
}

impl ProviderListener for SourcePipeline {
	fn on_tile_outcome(&self, provider: usize, key: TileKey, outcome: TileOutcome) {
		let cursor = self.in_flight.lock().get(&key).map(|entry| entry.cursor);
		let current = cursor == Some(provider);

		match outcome {
			TileOutcome::Loaded(image) => {
				self.store(key, &image);
				if !current {
					// nobody waits for it any more, but the cache keeps it
					return;
				}
				if image.is_expired() {
					if let Some(entry) = self.in_flight.lock().get_mut(&key) {
						entry.stale = Some(image);
					}
					self.dispatch(key, provider + 1);
				} else {
					self.complete(key, Some(image));
				}
			}
			_ if !current => {}
			TileOutcome::Dropped => self.complete(key, None),
			TileOutcome::NotFound | TileOutcome::Failed | TileOutcome::Drained => self.dispatch(key, provider + 1),
		}
	}

	fn on_systemic_failure(&self, provider: usize, failure: &SystemicFailure) {
		if failure.is_out_of_memory() {
			let trimmed = self.cache.trim_to(self.cache.len() / 2);
			log::warn!(
				"'{}' provider {provider} ran out of memory, released {trimmed} cached tiles",
				self.source.name
			);
		}
	}
}

impl Debug for SourcePipeline {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SourcePipeline")
			.field("source", &self.source.name)
			.field("cache", &self.cache)
			.field("providers", &self.providers)
			.field("in_flight", &self.in_flight_len())
			.finish()
	}
}
