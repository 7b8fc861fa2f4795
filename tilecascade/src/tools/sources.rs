use super::load_config;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
pub struct Subcommand {
	/// YAML configuration file, the built-in sources are listed without it
	#[arg(long, short)]
	config: Option<PathBuf>,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let config = load_config(arguments.config.as_deref())?;

	println!("{:<20} {:>5} {:>5} {:>5}  mirrors", "name", "min", "max", "size");
	for source in &config.sources {
		println!(
			"{:<20} {:>5} {:>5} {:>5}  {}",
			source.name,
			source.min_zoom,
			source.max_zoom,
			source.tile_size,
			source.base_urls.join(", ")
		);
	}
	Ok(())
}
