//! Static descriptions of remote tile sources.
//!
//! A [`TileSourceDescriptor`] names a tile source, its zoom bounds, tile size, file extension and
//! one or more mirror base URLs. Tile URLs are built as `base_url + zoom/column/row + extension`,
//! picking a mirror at random for every request to spread load.
//!
//! ```
//! use tilecascade_core::{TileKey, TileSourceDescriptor};
//!
//! let sources = TileSourceDescriptor::builtin();
//! let mapnik = TileSourceDescriptor::find(&sources, "Mapnik").unwrap();
//! let key = TileKey::new(3, 2, 1).unwrap();
//! assert_eq!(mapnik.tile_url(&key).unwrap(), "http://tile.openstreetmap.org/3/2/1.png");
//! assert_eq!(mapnik.relative_path(&key), "Mapnik/3/2/1.png");
//! ```

use super::TileKey;
use anyhow::{Context, Result, ensure};
use rand::seq::SliceRandom;
use serde::Deserialize;

/// Read-only description of one tile source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TileSourceDescriptor {
	/// Unique name, also the directory name inside the filesystem tile cache.
	pub name: String,
	#[serde(default)]
	pub min_zoom: u8,
	#[serde(default = "default_max_zoom")]
	pub max_zoom: u8,
	/// Edge length of a tile in pixels.
	#[serde(default = "default_tile_size")]
	pub tile_size: u32,
	/// File extension including the leading dot, e.g. `.png`.
	#[serde(default = "default_extension")]
	pub extension: String,
	/// Mirror base URLs, each ending with a slash.
	pub base_urls: Vec<String>,
}

fn default_max_zoom() -> u8 {
	18
}

fn default_tile_size() -> u32 {
	256
}

fn default_extension() -> String {
	String::from(".png")
}

impl TileSourceDescriptor {
	pub fn new(name: &str, min_zoom: u8, max_zoom: u8, tile_size: u32, extension: &str, base_urls: &[&str]) -> Self {
		TileSourceDescriptor {
			name: name.to_string(),
			min_zoom,
			max_zoom,
			tile_size,
			extension: extension.to_string(),
			base_urls: base_urls.iter().map(ToString::to_string).collect(),
		}
	}

	/// Check the descriptor for consistency after deserialization.
	pub fn validate(&self) -> Result<()> {
		ensure!(!self.name.is_empty(), "tile source name must not be empty");
		ensure!(
			self.min_zoom <= self.max_zoom,
			"tile source '{}': min_zoom ({}) must be <= max_zoom ({})",
			self.name,
			self.min_zoom,
			self.max_zoom
		);
		ensure!(
			self.max_zoom <= super::MAX_ZOOM,
			"tile source '{}': max_zoom ({}) must be <= {}",
			self.name,
			self.max_zoom,
			super::MAX_ZOOM
		);
		ensure!(self.tile_size > 0, "tile source '{}': tile_size must be > 0", self.name);
		Ok(())
	}

	pub fn supports_zoom(&self, zoom: u8) -> bool {
		(self.min_zoom..=self.max_zoom).contains(&zoom)
	}

	/// URL of a tile on a randomly chosen mirror.
	pub fn tile_url(&self, key: &TileKey) -> Result<String> {
		let base = self
			.base_urls
			.choose(&mut rand::thread_rng())
			.with_context(|| format!("tile source '{}' has no base URL", self.name))?;
		Ok(format!("{base}{}/{}/{}{}", key.zoom, key.column, key.row, self.extension))
	}

	/// Path of a tile relative to the root of a filesystem tile cache.
	pub fn relative_path(&self, key: &TileKey) -> String {
		format!(
			"{}/{}/{}/{}{}",
			self.name, key.zoom, key.column, key.row, self.extension
		)
	}

	/// The tile sources known without any configuration.
	pub fn builtin() -> Vec<TileSourceDescriptor> {
		vec![
			Self::new("Mapnik", 0, 18, 256, ".png", &["http://tile.openstreetmap.org/"]),
			Self::new(
				"CycleMap",
				0,
				17,
				256,
				".png",
				&[
					"http://a.tile.opencyclemap.org/cycle/",
					"http://b.tile.opencyclemap.org/cycle/",
					"http://c.tile.opencyclemap.org/cycle/",
				],
			),
			Self::new(
				"OSMPublicTransport",
				0,
				17,
				256,
				".png",
				&["http://tile.xn--pnvkarte-m4a.de/tilegen/"],
			),
			Self::new("Base", 4, 17, 256, ".png", &["http://topo.openstreetmap.de/base/"]),
			Self::new("Topo", 4, 17, 256, ".png", &["http://topo.openstreetmap.de/topo/"]),
			Self::new("Hills", 8, 17, 256, ".png", &["http://topo.geofabrik.de/hills/"]),
			Self::new(
				"MapquestOSM",
				0,
				18,
				256,
				".png",
				&[
					"http://otile1.mqcdn.com/tiles/1.0.0/osm/",
					"http://otile2.mqcdn.com/tiles/1.0.0/osm/",
					"http://otile3.mqcdn.com/tiles/1.0.0/osm/",
					"http://otile4.mqcdn.com/tiles/1.0.0/osm/",
				],
			),
			Self::new(
				"MapquestAerial",
				0,
				11,
				256,
				".png",
				&[
					"http://oatile1.mqcdn.com/naip/",
					"http://oatile2.mqcdn.com/naip/",
					"http://oatile3.mqcdn.com/naip/",
					"http://oatile4.mqcdn.com/naip/",
				],
			),
		]
	}

	/// Look up a descriptor by name.
	pub fn find<'a>(sources: &'a [TileSourceDescriptor], name: &str) -> Result<&'a TileSourceDescriptor> {
		sources
			.iter()
			.find(|source| source.name == name)
			.with_context(|| format!("unknown tile source '{name}'"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::collections::HashSet;

	#[test]
	fn random_mirror_is_one_of_the_base_urls() {
		let sources = TileSourceDescriptor::builtin();
		let source = TileSourceDescriptor::find(&sources, "MapquestOSM").unwrap();
		let key = TileKey::new(5, 17, 10).unwrap();
		let urls: HashSet<String> = (0..200).map(|_| source.tile_url(&key).unwrap()).collect();
		assert!(urls.len() > 1);
		for url in urls {
			assert!(url.starts_with("http://otile"));
			assert!(url.ends_with("/tiles/1.0.0/osm/5/17/10.png"));
		}
	}

	#[test]
	fn no_base_url_is_an_error() {
		let source = TileSourceDescriptor::new("Empty", 0, 3, 256, ".png", &[]);
		assert!(source.tile_url(&TileKey::new(0, 0, 0).unwrap()).is_err());
	}

	#[test]
	fn zoom_bounds() {
		let sources = TileSourceDescriptor::builtin();
		let hills = TileSourceDescriptor::find(&sources, "Hills").unwrap();
		assert!(!hills.supports_zoom(7));
		assert!(hills.supports_zoom(8));
		assert!(hills.supports_zoom(17));
		assert!(!hills.supports_zoom(18));
		assert!(TileSourceDescriptor::find(&sources, "Nope").is_err());
	}

	#[test]
	fn builtin_names() {
		let names: Vec<String> = TileSourceDescriptor::builtin().into_iter().map(|s| s.name).collect();
		assert_eq!(
			names,
			vec![
				"Mapnik",
				"CycleMap",
				"OSMPublicTransport",
				"Base",
				"Topo",
				"Hills",
				"MapquestOSM",
				"MapquestAerial"
			]
		);
	}

	#[test]
	fn deserialize_with_defaults() {
		let source: TileSourceDescriptor =
			serde_yaml_ng::from_str("name: Local\nbase_urls: ['http://localhost:8080/tiles/']").unwrap();
		assert_eq!(
			source,
			TileSourceDescriptor::new("Local", 0, 18, 256, ".png", &["http://localhost:8080/tiles/"])
		);
		source.validate().unwrap();

		let inverted: TileSourceDescriptor =
			serde_yaml_ng::from_str("{name: Bad, min_zoom: 9, max_zoom: 3, base_urls: []}").unwrap();
		assert!(inverted.validate().is_err());
		assert!(serde_yaml_ng::from_str::<TileSourceDescriptor>("{name: X, base_urls: [], colour: red}").is_err());
	}
}
