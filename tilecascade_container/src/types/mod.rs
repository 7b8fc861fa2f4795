mod archive_registry;
pub use archive_registry::*;

mod archive_store;
pub use archive_store::*;
