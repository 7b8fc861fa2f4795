use super::parse_tile_key;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tilecascade_container::ArchiveRegistry;
use tilecascade_core::TileImage;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// archive file you want to probe
	/// supported formats are: *.gemf, *.mbtiles, *.sqlite
	#[arg(required = true, verbatim_doc_comment)]
	filename: PathBuf,

	/// tiles to look up as zoom/column/row
	tiles: Vec<String>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	eprintln!("probe {:?}", arguments.filename);

	let archive = ArchiveRegistry::default().open(&arguments.filename)?;
	println!("type: {}", archive.archive_type());
	println!("available: {}", archive.is_available());

	for tile in &arguments.tiles {
		let key = parse_tile_key(tile)?;
		match archive.read_tile(&key).await? {
			Some(blob) => match TileImage::decode(&blob) {
				Ok(image) => println!("{key}: {} bytes, {}x{}", blob.len(), image.width(), image.height()),
				Err(err) => println!("{key}: {} bytes, not decodable: {err:#}", blob.len()),
			},
			None => println!("{key}: not found"),
		}
	}

	Ok(())
}
