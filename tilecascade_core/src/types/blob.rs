//! This module provides the [`Blob`] struct, a wrapper around [`Vec<u8>`] holding the raw, still
//! encoded bytes of a tile (PNG, JPEG, ...).
//!
//! ```rust
//! use tilecascade_core::Blob;
//!
//! let blob = Blob::from(vec![0x89, b'P', b'N', b'G']);
//! assert_eq!(blob.len(), 4);
//! assert_eq!(blob.range(1..4), b"PNG");
//! ```

use std::fmt::Debug;
use std::ops::Range;

/// Raw tile bytes as read from an archive, a file or the network.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Blob(Vec<u8>);

impl Blob {
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	pub fn range(&self, range: Range<usize>) -> &[u8] {
		&self.0[range]
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<u8>> for Blob {
	fn from(value: Vec<u8>) -> Self {
		Blob(value)
	}
}

impl From<&[u8]> for Blob {
	fn from(value: &[u8]) -> Self {
		Blob(value.to_vec())
	}
}

impl<const N: usize> From<&[u8; N]> for Blob {
	fn from(value: &[u8; N]) -> Self {
		Blob(value.to_vec())
	}
}

impl AsRef<[u8]> for Blob {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		const PREVIEW: usize = 16;
		let head = &self.0[..self.0.len().min(PREVIEW)];
		let hex: Vec<String> = head.iter().map(|b| format!("{b:02x}")).collect();
		let ellipsis = if self.0.len() > PREVIEW { " ..." } else { "" };
		write!(f, "Blob({}): {}{ellipsis}", self.0.len(), hex.join(" "))
	}
}
