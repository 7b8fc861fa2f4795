//! The read contract shared by all archive backends.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use tilecascade_core::{Blob, TileKey};

/// Read-only random access to the raw tile bytes of a packed tile archive.
///
/// Implementations hold their file handles or connection pools open for their whole lifetime
/// and must tolerate concurrent calls from many provider workers.
#[async_trait]
pub trait ArchiveStore: Debug + Send + Sync {
	/// Short identifier of the backend, e.g. `gemf` or `mbtiles`.
	fn archive_type(&self) -> &str;

	/// Human readable name, usually the path of the archive.
	fn name(&self) -> &str;

	/// Whether the storage behind the archive is still reachable.
	///
	/// Used to tell a vanished medium apart from a corrupt entry when a read fails.
	fn is_available(&self) -> bool {
		true
	}

	/// Fetch the encoded bytes of one tile. A tile that is not part of the archive is
	/// `Ok(None)`, not an error.
	async fn read_tile(&self, key: &TileKey) -> Result<Option<Blob>>;
}
