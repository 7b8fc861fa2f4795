//! tilecascade container: read-only access to packed tile archives.
//!
//! Every backend implements [`ArchiveStore`], a small object-safe trait that maps a
//! [`TileKey`](tilecascade_core::TileKey) to the encoded tile bytes, or to `None` when the archive
//! does not contain the tile. Archives are opened by file extension through the
//! [`ArchiveRegistry`]:
//!
//! - `gemf`: GEMF packed index archives, optionally spread over sibling files ([`GemfReader`])
//! - `mbtiles`, `sqlite`: MBTiles databases ([`MBTilesReader`])
//!
//! # Features
//! - `test`: fixture builders for GEMF and MBTiles archives, for tests in downstream crates.

mod container;
pub use container::*;

mod types;
pub use types::*;

#[cfg(any(test, feature = "test"))]
pub mod testing;
