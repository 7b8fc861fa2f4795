//! A thread-safe LRU cache of decoded tiles that reclaims evicted resources.
//!
//! Recency is updated on [`get`](TileCache::get) and [`put`](TileCache::put). Whenever the number
//! of entries exceeds the capacity, the least recently used entry is removed from the index and
//! its [`Reclaimable::reclaim`] hook runs while the write lock is still held, so a reclaimed value
//! is never handed out by the cache. [`clear`](TileCache::clear) evicts entry by entry for the
//! same reason.
//!
//! ```
//! use tilecascade::TileCache;
//! use tilecascade_core::{TileImage, TileKey};
//!
//! let cache = TileCache::new(2);
//! let first = TileImage::filled(1, [0, 0, 0, 255]);
//! cache.put(TileKey::new(1, 0, 0).unwrap(), first.clone());
//! cache.put(TileKey::new(1, 1, 0).unwrap(), TileImage::filled(1, [1, 1, 1, 255]));
//! cache.put(TileKey::new(1, 0, 1).unwrap(), TileImage::filled(1, [2, 2, 2, 255]));
//!
//! assert_eq!(cache.len(), 2);
//! assert!(first.is_recycled());
//! ```

use lru::LruCache;
use parking_lot::RwLock;
use std::fmt::{self, Debug};
use tilecascade_core::{TileImage, TileKey};

/// Values that own a resource which must be released explicitly when they leave the cache.
pub trait Reclaimable: Clone + Send + Sync {
	/// Release the underlying resource.
	fn reclaim(&self);

	/// Estimated memory held by the value.
	fn byte_size(&self) -> usize {
		0
	}

	/// Whether both values refer to the same resource, in which case replacing one with the
	/// other must not reclaim anything.
	fn shares_resource(&self, other: &Self) -> bool;
}

impl Reclaimable for TileImage {
	fn reclaim(&self) {
		self.recycle();
	}

	fn byte_size(&self) -> usize {
		TileImage::byte_size(self)
	}

	fn shares_resource(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

struct CacheInner<V> {
	entries: LruCache<TileKey, V>,
	capacity: usize,
	bytes: usize,
}

impl<V: Reclaimable> CacheInner<V> {
	fn evict_lru(&mut self) -> bool {
		match self.entries.pop_lru() {
			Some((key, value)) => {
				self.release(&key, &value);
				true
			}
			None => false,
		}
	}

	fn evict(&mut self, key: &TileKey) -> bool {
		match self.entries.pop(key) {
			Some(value) => {
				self.release(key, &value);
				true
			}
			None => false,
		}
	}

	fn release(&mut self, key: &TileKey, value: &V) {
		log::trace!("evict {key:?}");
		self.bytes = self.bytes.saturating_sub(value.byte_size());
		value.reclaim();
	}
}

/// Fixed-capacity LRU cache mapping [`TileKey`]s to decoded tiles.
pub struct TileCache<V: Reclaimable = TileImage> {
	inner: RwLock<CacheInner<V>>,
}

impl<V: Reclaimable> TileCache<V> {
	/// Create a cache holding at most `capacity` entries, at least one.
	pub fn new(capacity: usize) -> Self {
		Self {
			inner: RwLock::new(CacheInner {
				entries: LruCache::unbounded(),
				capacity: capacity.max(1),
				bytes: 0,
			}),
		}
	}

	/// Look up a tile and mark it as most recently used.
	pub fn get(&self, key: &TileKey) -> Option<V> {
		self.inner.write().entries.get(key).cloned()
	}

	/// Look up a tile without touching its recency.
	pub fn peek(&self, key: &TileKey) -> Option<V> {
		self.inner.read().entries.peek(key).cloned()
	}

	pub fn contains(&self, key: &TileKey) -> bool {
		self.inner.read().entries.contains(key)
	}

	/// Insert or replace a tile. May evict the least recently used entries.
	pub fn put(&self, key: TileKey, value: V) {
		let mut inner = self.inner.write();
		inner.bytes += value.byte_size();
		if let Some(previous) = inner.entries.put(key, value.clone()) {
			inner.bytes = inner.bytes.saturating_sub(previous.byte_size());
			if !previous.shares_resource(&value) {
				previous.reclaim();
			}
		}
		while inner.entries.len() > inner.capacity {
			inner.evict_lru();
		}
	}

	/// Invalidate a single tile. Returns whether it was cached.
	pub fn remove(&self, key: &TileKey) -> bool {
		self.inner.write().evict(key)
	}

	/// Evict every entry, reclaiming each one.
	pub fn clear(&self) {
		let mut inner = self.inner.write();
		let mut count = 0;
		while inner.evict_lru() {
			count += 1;
		}
		log::debug!("cleared {count} tiles");
	}

	/// Raise the capacity. Requests that would shrink the cache are ignored.
	pub fn grow_capacity(&self, capacity: usize) {
		let mut inner = self.inner.write();
		if capacity > inner.capacity {
			log::info!("tile cache capacity {} -> {capacity}", inner.capacity);
			inner.capacity = capacity;
		} else {
			log::debug!(
				"ignoring request to shrink tile cache from {} to {capacity}",
				inner.capacity
			);
		}
	}

	/// Evict all entries matching `predicate`. Returns the number of evicted entries.
	pub fn evict_where(&self, predicate: impl Fn(&TileKey, &V) -> bool) -> usize {
		let mut inner = self.inner.write();
		let keys: Vec<TileKey> = inner
			.entries
			.iter()
			.filter(|(key, value)| predicate(*key, *value))
			.map(|(key, _)| *key)
			.collect();
		for key in &keys {
			inner.evict(key);
		}
		keys.len()
	}

	/// Evict least recently used entries until at most `len` remain.
	pub fn trim_to(&self, len: usize) -> usize {
		let mut inner = self.inner.write();
		let mut count = 0;
		while inner.entries.len() > len && inner.evict_lru() {
			count += 1;
		}
		count
	}

	/// Cached keys, most recently used first.
	pub fn keys(&self) -> Vec<TileKey> {
		self.inner.read().entries.iter().map(|(key, _)| *key).collect()
	}

	pub fn len(&self) -> usize {
		self.inner.read().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().entries.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.inner.read().capacity
	}

	/// Estimated memory held by all cached values.
	pub fn byte_size(&self) -> usize {
		self.inner.read().bytes
	}
}

impl<V: Reclaimable> Debug for TileCache<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = self.inner.read();
		f.debug_struct("TileCache")
			.field("len", &inner.entries.len())
			.field("capacity", &inner.capacity)
			.field("bytes", &inner.bytes)
			.finish()
	}
}
