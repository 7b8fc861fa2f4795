use super::{load_config, parse_tile_key};
use anyhow::{Context, Result};
use clap::Args;
use std::{path::PathBuf, sync::Arc};
use tilecascade::{SwitchableAvailability, TileEngine};
use tokio::runtime::Handle;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// tile as zoom/column/row, e.g. 12/2200/1343
	#[arg(required = true)]
	tile: String,

	/// PNG file to write
	#[arg(long, short, required = true)]
	output: PathBuf,

	/// name of the tile source
	#[arg(long, short, default_value = "Mapnik")]
	source: String,

	/// YAML configuration file
	#[arg(long, short)]
	config: Option<PathBuf>,

	/// archive searched before downloading, can be repeated
	#[arg(long = "archive", short = 'a')]
	archives: Vec<PathBuf>,

	/// root directory of the filesystem tile cache
	#[arg(long)]
	tile_dir: Option<PathBuf>,

	/// never download
	#[arg(long)]
	offline: bool,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let key = parse_tile_key(&arguments.tile)?;

	let mut config = load_config(arguments.config.as_deref())?;
	config.archives.extend(arguments.archives.iter().cloned());
	if arguments.tile_dir.is_some() {
		config.tile_dir.clone_from(&arguments.tile_dir);
	}

	let availability = Arc::new(SwitchableAvailability::new(!arguments.offline));
	let engine = TileEngine::from_config(&config, Handle::current(), availability)?;
	engine.source(&arguments.source)?;

	eprintln!("fetch {key} of '{}'", arguments.source);
	let image = engine
		.resolve(key, &arguments.source)
		.await
		.with_context(|| format!("tile {key} of '{}' is not available", arguments.source))?;
	engine.shutdown();

	if image.is_expired() {
		log::warn!("tile {key} is outdated, no fresher copy was available");
	}

	let png = image.encode_png()?;
	std::fs::write(&arguments.output, png.as_slice())
		.with_context(|| format!("writing {:?}", arguments.output))?;
	eprintln!("saved {}x{} tile to {:?}", image.width(), image.height(), arguments.output);
	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::tests::run_command;
	use assert_fs::TempDir;
	use tilecascade_container::testing::{png_tile, write_mbtiles};
	use tilecascade_core::{TileImage, TileKey};

	#[test]
	fn fetch_from_archive() {
		let dir = TempDir::new().unwrap();
		let archive = dir.path().join("berlin.mbtiles");
		write_mbtiles(&archive, &[(TileKey::new(2, 1, 1).unwrap(), png_tile([5, 6, 7, 255]))]).unwrap();
		let output = dir.path().join("tile.png");

		run_command(vec![
			"tilecascade",
			"fetch",
			"-q",
			"--offline",
			"-a",
			archive.to_str().unwrap(),
			"-o",
			output.to_str().unwrap(),
			"2/1/1",
		])
		.unwrap();

		let image = TileImage::decode(&std::fs::read(&output).unwrap().into()).unwrap();
		assert_eq!(image.with_pixels(|p| p.get_pixel(0, 0).0), Some([5, 6, 7, 255]));
	}

	#[test]
	fn missing_tile_is_an_error() {
		let dir = TempDir::new().unwrap();
		let output = dir.path().join("tile.png");
		let result = run_command(vec![
			"tilecascade",
			"fetch",
			"-q",
			"--offline",
			"-o",
			output.to_str().unwrap(),
			"2/1/1",
		]);
		assert!(result.is_err());
		assert!(!output.exists());
	}

	#[test]
	fn unknown_source() {
		let dir = TempDir::new().unwrap();
		let output = dir.path().join("tile.png");
		let err = run_command(vec![
			"tilecascade",
			"fetch",
			"--offline",
			"-s",
			"Nowhere",
			"-o",
			output.to_str().unwrap(),
			"0/0/0",
		])
		.unwrap_err();
		assert!(err.to_string().contains("Nowhere"));
	}
}
