//! Orchestration of caches and providers per tile source.

mod builder;
pub use builder::*;

mod pipeline;
pub use pipeline::{ProviderSpec, TileCallback};
use pipeline::SourcePipeline;

mod rescale;

mod tile_engine;
pub use tile_engine::*;
