//! Failures that invalidate a whole batch of pending tile work.
//!
//! Tile loaders return `anyhow::Result`. Most errors only concern a single tile (file missing,
//! HTTP 404, corrupt image). A [`SystemicFailure`] anywhere in the error chain marks the error as
//! external to the tile: retrying other tiles is futile until the condition changes.
//!
//! ```
//! use anyhow::anyhow;
//! use tilecascade_core::{SystemicFailure, systemic_cause};
//!
//! let err = anyhow::Error::new(SystemicFailure::Unreachable("tile.example.org".into()))
//! 	.context("downloading 3/2/1");
//! assert!(matches!(systemic_cause(&err), Some(SystemicFailure::Unreachable(_))));
//!
//! assert!(systemic_cause(&anyhow!("HTTP 404")).is_none());
//! ```

use std::fmt;

/// A fault whose cause is external to any single tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemicFailure {
	/// No route to host, unknown host, connection refused.
	Unreachable(String),
	/// Decoding ran out of memory or hit the decoder's allocation limits.
	OutOfMemory(String),
	/// The storage medium holding tiles is not mounted or not readable.
	StorageUnavailable(String),
}

impl SystemicFailure {
	pub fn is_out_of_memory(&self) -> bool {
		matches!(self, SystemicFailure::OutOfMemory(_))
	}
}

impl fmt::Display for SystemicFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SystemicFailure::Unreachable(detail) => write!(f, "host unreachable: {detail}"),
			SystemicFailure::OutOfMemory(detail) => write!(f, "out of memory: {detail}"),
			SystemicFailure::StorageUnavailable(detail) => write!(f, "storage unavailable: {detail}"),
		}
	}
}

impl std::error::Error for SystemicFailure {}

/// Find the [`SystemicFailure`] in an error, whether it is the error itself, a context layer, or
/// a source further down the chain.
pub fn systemic_cause(err: &anyhow::Error) -> Option<&SystemicFailure> {
	err.downcast_ref::<SystemicFailure>()
		.or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<SystemicFailure>()))
}
