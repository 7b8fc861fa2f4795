//! Archive backends.

mod gemf;
pub use gemf::*;

mod mbtiles;
pub use mbtiles::*;
