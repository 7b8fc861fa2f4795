//! # tilecascade
//!
//! Resolves map tiles through a cascade of tiers: an in-memory LRU cache, a filesystem tile
//! cache, tile archives (GEMF, MBTiles) and finally remote tile servers.
//!
//! Every tier except the memory cache is served by a worker pool with a bounded priority queue.
//! Concurrent requests for the same tile share one resolution, and a provider that hits a
//! systemic failure (host unreachable, storage gone, out of memory) drains its queue instead of
//! failing every queued tile one by one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tilecascade::{AlwaysOnline, ResolverConfig, TileEngine};
//! use tilecascade_core::TileKey;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResolverConfig::from_string("tile_dir: /var/cache/tiles\narchives: [/data/world.gemf]")?;
//!     let engine = TileEngine::from_config(&config, tokio::runtime::Handle::current(), Arc::new(AlwaysOnline))?;
//!
//!     engine.request(TileKey::new(5, 17, 10)?, "Mapnik", |key, image| match image {
//!         Some(image) => println!("{key}: {}x{}", image.width(), image.height()),
//!         None => println!("{key}: not available"),
//!     });
//!     Ok(())
//! }
//! ```

pub mod cache;
pub use cache::*;

pub mod config;
pub use config::*;

pub mod engine;
pub use engine::*;

pub mod provider;
pub use provider::*;
