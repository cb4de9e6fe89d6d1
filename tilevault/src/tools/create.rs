use anyhow::Result;
use std::path::PathBuf;
use tilevault::TilesetStore;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// path of the tile store to create
	#[arg()]
	file: PathBuf,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	TilesetStore::create(&arguments.file)?;
	Ok(())
}
