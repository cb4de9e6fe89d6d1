use anyhow::Result;
use std::path::PathBuf;
use tilevault::{CompactOptions, TilesetStore, TransformPipeline, compact_store};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// the tile store to compact
	#[arg()]
	file: PathBuf,

	/// shell command run on every tile before hashing; `{}` is replaced by
	/// the tile's temp file path (repeatable)
	#[arg(long = "execute", short = 'x', value_name = "COMMAND")]
	execute: Vec<String>,

	/// number of rows fetched per chunk
	#[arg(long, value_name = "int", default_value_t = 100)]
	chunk_size: i64,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = TilesetStore::open(&arguments.file)?;
	let options = CompactOptions {
		pipeline: TransformPipeline::from_commands(arguments.execute.clone()),
		chunk_size: arguments.chunk_size,
	};
	compact_store(&store, &options)?;
	Ok(())
}
