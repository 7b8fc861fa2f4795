//! In-memory caching of decoded tiles.

mod tile_cache;
pub use tile_cache::*;
