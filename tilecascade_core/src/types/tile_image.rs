//! Decoded tile images with explicit reclamation.
//!
//! A [`TileImage`] is a cheap-to-clone handle to the RGBA pixels of one tile. The pixel buffer
//! can be released explicitly with [`TileImage::recycle`] while handles are still around; every
//! handle then observes the image as recycled. The tile cache recycles images it evicts.
//!
//! Images also carry an *expired* flag: the pixels are usable, but a fresher version should be
//! fetched if possible.
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use tilecascade_core::TileImage;
//!
//! let image = TileImage::from_rgba(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
//! let handle = image.clone();
//! assert_eq!(image.byte_size(), 64);
//!
//! assert!(handle.recycle());
//! assert!(image.is_recycled());
//! assert!(image.with_pixels(|pixels| pixels.width()).is_none());
//! ```

use super::{Blob, SystemicFailure};
use anyhow::{Context, Result};
use image::{ImageError, ImageFormat, Rgba, RgbaImage};
use parking_lot::RwLock;
use std::{
	fmt::{self, Debug},
	io::Cursor,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

/// Shared handle to a decoded tile.
#[derive(Clone)]
pub struct TileImage {
	inner: Arc<TileImageInner>,
}

struct TileImageInner {
	pixels: RwLock<Option<RgbaImage>>,
	width: u32,
	height: u32,
	byte_size: usize,
	expired: AtomicBool,
}

impl TileImage {
	pub fn from_rgba(pixels: RgbaImage) -> TileImage {
		let (width, height) = pixels.dimensions();
		let byte_size = pixels.as_raw().len();
		TileImage {
			inner: Arc::new(TileImageInner {
				pixels: RwLock::new(Some(pixels)),
				width,
				height,
				byte_size,
				expired: AtomicBool::new(false),
			}),
		}
	}

	/// A square image of a single colour.
	pub fn filled(size: u32, rgba: [u8; 4]) -> TileImage {
		TileImage::from_rgba(RgbaImage::from_pixel(size, size, Rgba(rgba)))
	}

	/// Decode PNG, JPEG or any other format the `image` crate recognises.
	///
	/// # Errors
	/// Returns a per-tile error for undecodable data, and a [`SystemicFailure::OutOfMemory`] when
	/// the decoder hits its allocation limits.
	pub fn decode(blob: &Blob) -> Result<TileImage> {
		match image::load_from_memory(blob.as_slice()) {
			Ok(image) => Ok(TileImage::from_rgba(image.to_rgba8())),
			Err(ImageError::Limits(e)) => Err(anyhow::Error::new(SystemicFailure::OutOfMemory(e.to_string()))),
			Err(e) => Err(anyhow::Error::new(e).context(format!("decoding {} bytes of tile data", blob.len()))),
		}
	}

	pub fn width(&self) -> u32 {
		self.inner.width
	}

	pub fn height(&self) -> u32 {
		self.inner.height
	}

	/// Size of the pixel buffer in bytes, also after it has been recycled.
	pub fn byte_size(&self) -> usize {
		self.inner.byte_size
	}

	pub fn is_expired(&self) -> bool {
		self.inner.expired.load(Ordering::Acquire)
	}

	pub fn set_expired(&self, expired: bool) {
		self.inner.expired.store(expired, Ordering::Release);
	}

	/// Builder-style variant of [`set_expired`](Self::set_expired).
	pub fn into_expired(self) -> TileImage {
		self.set_expired(true);
		self
	}

	/// Release the pixel buffer. Returns `false` if it was already released.
	pub fn recycle(&self) -> bool {
		self.inner.pixels.write().take().is_some()
	}

	pub fn is_recycled(&self) -> bool {
		self.inner.pixels.read().is_none()
	}

	/// Run `f` on the pixels unless the image has been recycled.
	pub fn with_pixels<R>(&self, f: impl FnOnce(&RgbaImage) -> R) -> Option<R> {
		self.inner.pixels.read().as_ref().map(f)
	}

	/// Whether both handles point to the same pixel buffer.
	pub fn ptr_eq(&self, other: &TileImage) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Encode the pixels as PNG.
	pub fn encode_png(&self) -> Result<Blob> {
		let mut buffer = Cursor::new(Vec::new());
		self
			.with_pixels(|pixels| pixels.write_to(&mut buffer, ImageFormat::Png))
			.context("tile image has been recycled")?
			.context("encoding tile image as PNG")?;
		Ok(Blob::from(buffer.into_inner()))
	}
}

impl Debug for TileImage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TileImage")
			.field("width", &self.inner.width)
			.field("height", &self.inner.height)
			.field("expired", &self.is_expired())
			.field("recycled", &self.is_recycled())
			.finish()
	}
}
