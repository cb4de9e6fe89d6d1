use super::ZoomArgs;
use anyhow::Result;
use std::path::PathBuf;
use tilevault::{RewriteOptions, TilesetStore, TransformPipeline, rewrite_store};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// the tile store to rewrite; must already be normalized
	#[arg()]
	file: PathBuf,

	/// shell command run on every distinct tile content; `{}` is replaced
	/// by the tile's temp file path (repeatable)
	#[arg(long = "execute", short = 'x', value_name = "COMMAND", required = true)]
	execute: Vec<String>,

	#[command(flatten)]
	zoom: ZoomArgs,

	/// number of parallel transform workers (default: all cores)
	#[arg(long, value_name = "int", display_order = 3)]
	poolsize: Option<usize>,

	/// number of rows fetched per chunk
	#[arg(long, value_name = "int", default_value_t = 1000, display_order = 3)]
	chunk_size: i64,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = TilesetStore::open(&arguments.file)?;

	let mut options = RewriteOptions::new(TransformPipeline::new(arguments.execute.clone()));
	options.zoom = arguments.zoom.to_range()?;
	options.pool_size = arguments.poolsize;
	options.chunk_size = arguments.chunk_size;

	rewrite_store(&store, &options)?;
	Ok(())
}
