//! Value types shared by every tilecascade crate: tile addressing, raw and decoded tile data,
//! tile source descriptions and the systemic failure classification.

mod blob;
pub use blob::*;

mod byte_range;
pub use byte_range::*;

mod failure;
pub use failure::*;

mod tile_image;
pub use tile_image::*;

mod tile_key;
pub use tile_key::*;

mod tile_range;
pub use tile_range::*;

mod tile_source;
pub use tile_source::*;
