//! Core types of the tilecascade tile resolution engine: [`TileKey`], [`TileRange`], [`Blob`],
//! [`TileImage`], [`TileSourceDescriptor`] and [`SystemicFailure`].

pub mod types;
pub use types::*;
