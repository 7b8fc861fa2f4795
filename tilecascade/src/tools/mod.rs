pub mod fetch;
pub mod probe;
pub mod sources;

use anyhow::{Context, Result};
use std::path::Path;
use tilecascade::ResolverConfig;
use tilecascade_core::TileKey;

/// Parse a tile given as `zoom/column/row`.
pub fn parse_tile_key(text: &str) -> Result<TileKey> {
	let parts: Vec<&str> = text.split('/').collect();
	let [zoom, column, row] = parts.as_slice() else {
		anyhow::bail!("tile '{text}' must be given as zoom/column/row");
	};
	TileKey::new(
		zoom.trim().parse().with_context(|| format!("invalid zoom in '{text}'"))?,
		column.trim().parse().with_context(|| format!("invalid column in '{text}'"))?,
		row.trim().parse().with_context(|| format!("invalid row in '{text}'"))?,
	)
}

pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
	match path {
		Some(path) => ResolverConfig::from_path(path),
		None => Ok(ResolverConfig::default()),
	}
}
