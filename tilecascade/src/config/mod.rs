//! YAML configuration of the tile resolution engine.

mod resolver;
pub use resolver::*;
