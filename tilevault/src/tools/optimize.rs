use anyhow::Result;
use std::path::PathBuf;
use tilevault::TilesetStore;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// the tile store to optimize
	#[arg()]
	file: PathBuf,

	/// skip ANALYZE
	#[arg(long)]
	skip_analyze: bool,

	/// skip VACUUM
	#[arg(long)]
	skip_vacuum: bool,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = TilesetStore::open(&arguments.file)?;
	store.optimize(arguments.skip_analyze, arguments.skip_vacuum)?;
	Ok(())
}
