mod index;
pub use index::*;

mod reader;
pub use reader::*;
