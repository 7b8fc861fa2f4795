//! This module provides the `ByteRange` struct, which represents a range of bytes with an offset and length.
//!
//! ```rust
//! use tilecascade_core::ByteRange;
//!
//! let range = ByteRange::new(23, 42);
//! assert_eq!(range.end(), 65);
//! assert_eq!(range.as_range_usize(), 23..65);
//! ```

use std::fmt;
use std::ops::Range;

/// A contiguous range of bytes inside a file.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Default)]
pub struct ByteRange {
	/// The starting offset of the byte range.
	pub offset: u64,
	/// The length of the byte range.
	pub length: u64,
}

impl ByteRange {
	pub fn new(offset: u64, length: u64) -> Self {
		Self { offset, length }
	}

	/// First byte after the range.
	pub fn end(&self) -> u64 {
		self.offset + self.length
	}

	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// Returns the range moved backward by `offset`, e.g. to make a global offset file-relative.
	pub fn shifted_backward(&self, offset: u64) -> Self {
		Self {
			offset: self.offset - offset,
			length: self.length,
		}
	}

	pub fn as_range_usize(&self) -> Range<usize> {
		Range {
			start: self.offset as usize,
			end: self.end() as usize,
		}
	}
}

impl fmt::Debug for ByteRange {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "[{}..{}]", self.offset, self.end())
	}
}

impl fmt::Display for ByteRange {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}+{}", self.offset, self.length)
	}
}
