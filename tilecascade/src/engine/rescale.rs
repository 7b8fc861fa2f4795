//! Placeholder tiles derived from cached tiles of another zoom level.
//!
//! Zooming in, a placeholder is the matching quarter (eighth, ...) of the cached parent, scaled
//! up. Zooming out, it is the cached children scaled down and stitched together. Placeholders
//! are blurry or incomplete, so they are always cached as expired.

use crate::cache::TileCache;
use image::{
	RgbaImage,
	imageops::{self, FilterType},
};
use std::{cmp::Ordering, collections::HashSet};
use tilecascade_core::{TileImage, TileKey, TileRange};

/// Parents more than this many levels up are too coarse to be useful.
const MAX_UPSCALE_LEVELS: u8 = 4;
/// Each level down quadruples the number of children to stitch.
const MAX_DOWNSCALE_LEVELS: u8 = 2;

/// Viewport keys that a placeholder could be derived for from the `cached` keys of
/// `previous_zoom`, in the order of the cached keys they come from.
///
/// Bounded by the number of cached keys, not by the size of the viewport.
pub(crate) fn placeholder_keys(cached: &[TileKey], previous_zoom: u8, viewport: &TileRange) -> Vec<TileKey> {
	let zoom = viewport.zoom;
	let mut seen = HashSet::new();
	let mut keys = Vec::new();
	let sources = cached.iter().filter(|key| key.zoom == previous_zoom);

	match previous_zoom.cmp(&zoom) {
		Ordering::Less if zoom - previous_zoom <= MAX_UPSCALE_LEVELS => {
			for parent in sources {
				if let Some(covered) = TileRange::descendants(parent, zoom).intersection(viewport) {
					keys.extend(covered.iter_keys());
				}
			}
		}
		Ordering::Greater if previous_zoom - zoom <= MAX_DOWNSCALE_LEVELS => {
			for child in sources {
				let parent = child.at_zoom(zoom);
				if viewport.contains(&parent) && seen.insert(parent) {
					keys.push(parent);
				}
			}
		}
		_ => {}
	}
	keys
}

pub(crate) fn derive_placeholder(
	cache: &TileCache,
	key: &TileKey,
	previous_zoom: u8,
	tile_size: u32,
) -> Option<TileImage> {
	match previous_zoom.cmp(&key.zoom) {
		Ordering::Less => upscale_parent(cache, key, key.zoom - previous_zoom),
		Ordering::Greater => downscale_children(cache, key, previous_zoom - key.zoom, tile_size),
		Ordering::Equal => None,
	}
}

fn upscale_parent(cache: &TileCache, key: &TileKey, levels: u8) -> Option<TileImage> {
	if levels > MAX_UPSCALE_LEVELS {
		return None;
	}
	let parent_key = key.at_zoom(key.zoom - levels);
	let parent = cache.peek(&parent_key)?;

	parent
		.with_pixels(|pixels| {
			let (width, height) = pixels.dimensions();
			let part_width = width >> levels;
			let part_height = height >> levels;
			if part_width == 0 || part_height == 0 {
				return None;
			}
			let column = key.column - (parent_key.column << levels);
			let row = key.row - (parent_key.row << levels);
			let part =
				imageops::crop_imm(pixels, column * part_width, row * part_height, part_width, part_height).to_image();
			Some(imageops::resize(&part, width, height, FilterType::Nearest))
		})
		.flatten()
		.map(TileImage::from_rgba)
}

fn downscale_children(cache: &TileCache, key: &TileKey, levels: u8, tile_size: u32) -> Option<TileImage> {
	if levels > MAX_DOWNSCALE_LEVELS {
		return None;
	}
	let part_size = tile_size >> levels;
	if part_size == 0 {
		return None;
	}

	let origin = key.at_zoom(key.zoom + levels);
	let mut canvas = RgbaImage::new(tile_size, tile_size);
	let mut found = false;

	for child_key in key.children_at(key.zoom + levels) {
		let Some(child) = cache.peek(&child_key) else {
			continue;
		};
		let placed = child.with_pixels(|pixels| {
			let part = imageops::resize(pixels, part_size, part_size, FilterType::Triangle);
			let x = (child_key.column - origin.column) * part_size;
			let y = (child_key.row - origin.row) * part_size;
			imageops::replace(&mut canvas, &part, i64::from(x), i64::from(y));
		});
		found |= placed.is_some();
	}

	found.then(|| TileImage::from_rgba(canvas))
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::Rgba;
	use pretty_assertions::assert_eq;

	fn key(zoom: u8, column: u32, row: u32) -> TileKey {
		TileKey::new(zoom, column, row).unwrap()
	}

	fn pixel(image: &TileImage, x: u32, y: u32) -> [u8; 4] {
		image.with_pixels(|p| p.get_pixel(x, y).0).unwrap()
	}

	/// Four quadrants of different colours.
	fn quadrants(size: u32) -> TileImage {
		let half = size / 2;
		TileImage::from_rgba(RgbaImage::from_fn(size, size, |x, y| match (x < half, y < half) {
			(true, true) => Rgba([255, 0, 0, 255]),
			(false, true) => Rgba([0, 255, 0, 255]),
			(true, false) => Rgba([0, 0, 255, 255]),
			(false, false) => Rgba([255, 255, 0, 255]),
		}))
	}

	#[test]
	fn zoom_in_uses_parent_quadrant() {
		let cache = TileCache::new(10);
		cache.put(key(3, 2, 5), quadrants(8));

		let top_right = derive_placeholder(&cache, &key(4, 5, 10), 3, 8).unwrap();
		assert_eq!((top_right.width(), top_right.height()), (8, 8));
		assert_eq!(pixel(&top_right, 0, 0), [0, 255, 0, 255]);
		assert_eq!(pixel(&top_right, 7, 7), [0, 255, 0, 255]);

		let bottom_left = derive_placeholder(&cache, &key(4, 4, 11), 3, 8).unwrap();
		assert_eq!(pixel(&bottom_left, 3, 3), [0, 0, 255, 255]);

		assert!(derive_placeholder(&cache, &key(4, 0, 0), 3, 8).is_none());
	}

	#[test]
	fn zoom_out_stitches_children() {
		let cache = TileCache::new(10);
		cache.put(key(5, 6, 2), TileImage::filled(8, [255, 0, 0, 255]));
		cache.put(key(5, 7, 3), TileImage::filled(8, [0, 0, 255, 255]));

		let parent = derive_placeholder(&cache, &key(4, 3, 1), 5, 8).unwrap();
		assert_eq!(pixel(&parent, 0, 0), [255, 0, 0, 255]);
		assert_eq!(pixel(&parent, 7, 7), [0, 0, 255, 255]);
		// missing children stay transparent
		assert_eq!(pixel(&parent, 7, 0), [0, 0, 0, 0]);

		assert!(derive_placeholder(&cache, &key(4, 0, 0), 5, 8).is_none());
	}

	#[test]
	fn candidates_come_from_cached_keys() {
		let viewport = TileRange::new(4, 4, 2, 5, 3).unwrap();
		let cached = vec![key(3, 2, 1), key(3, 0, 0), key(5, 9, 4), key(4, 4, 2)];
		assert_eq!(
			placeholder_keys(&cached, 3, &viewport),
			vec![key(4, 4, 2), key(4, 5, 2), key(4, 4, 3), key(4, 5, 3)]
		);

		let cached = vec![key(5, 9, 4), key(5, 8, 5), key(5, 11, 6), key(5, 0, 0)];
		assert_eq!(placeholder_keys(&cached, 5, &viewport), vec![key(4, 4, 2), key(4, 5, 3)]);

		// too far away to derive anything
		assert!(placeholder_keys(&[key(1, 0, 0)], 1, &TileRange::full(6).unwrap()).is_empty());
		assert!(placeholder_keys(&[key(7, 32, 16)], 7, &viewport).is_empty());
	}

	#[test]
	fn candidates_ignore_the_viewport_size() {
		let viewport = TileRange::full(31).unwrap();
		assert!(placeholder_keys(&[], 30, &viewport).is_empty());
		assert_eq!(placeholder_keys(&[key(30, 7, 7)], 30, &viewport).len(), 4);
	}

	#[test]
	fn limits_and_recycled_sources() {
		let cache = TileCache::new(10);
		let parent = TileImage::filled(256, [1, 2, 3, 255]);
		cache.put(key(2, 1, 1), parent.clone());

		assert!(derive_placeholder(&cache, &key(2, 1, 1), 2, 256).is_none());
		assert!(derive_placeholder(&cache, &key(6, 16, 16), 2, 256).is_some());
		assert!(derive_placeholder(&cache, &key(7, 32, 32), 2, 256).is_none());
		assert!(derive_placeholder(&cache, &key(0, 0, 0), 3, 256).is_none());

		parent.recycle();
		assert!(derive_placeholder(&cache, &key(3, 2, 2), 2, 256).is_none());
	}
}
