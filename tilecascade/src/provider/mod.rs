//! Tile providers: a worker pool per storage kind around a [`TileLoader`].

mod archive;
pub use archive::*;

mod availability;
pub use availability::*;

mod filesystem;
pub use filesystem::*;

mod network;
pub use network::*;

mod pool;
pub use pool::*;

mod queue;
pub use queue::*;

mod traits;
pub use traits::*;

mod writer;
pub use writer::*;
