use super::ZoomArgs;
use anyhow::Result;
use std::path::PathBuf;
use tilevault::{MergeOptions, QuickCheckValidator, TilesetStore, TransformPipeline, merge_stores};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// the receiving tile store; must already be normalized
	#[arg()]
	destination: PathBuf,

	/// the store whose tiles are merged into the destination
	#[arg()]
	source: PathBuf,

	#[command(flatten)]
	zoom: ZoomArgs,

	/// keep tiles that already exist in the destination
	#[arg(long, display_order = 2)]
	no_overwrite: bool,

	/// flip the row axis of source tiles
	#[arg(long, display_order = 2)]
	flip_y: bool,

	/// delete the merged tiles from the source afterwards
	#[arg(long, display_order = 2)]
	delete_source: bool,

	/// run an integrity check on the source before merging
	#[arg(long, display_order = 2)]
	check: bool,

	/// shell command run on every tile content; `{}` is replaced by the
	/// tile's temp file path (repeatable)
	#[arg(long = "execute", short = 'x', value_name = "COMMAND", display_order = 3)]
	execute: Vec<String>,

	/// number of parallel transform workers (default: all cores)
	#[arg(long, value_name = "int", display_order = 3)]
	poolsize: Option<usize>,

	/// number of rows fetched per chunk
	#[arg(long, value_name = "int", default_value_t = 100, display_order = 3)]
	chunk_size: i64,

	/// skip ANALYZE after deleting from the source
	#[arg(long, display_order = 4)]
	skip_analyze: bool,

	/// skip VACUUM after deleting from the source
	#[arg(long, display_order = 4)]
	skip_vacuum: bool,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let destination = TilesetStore::open(&arguments.destination)?;
	let source = TilesetStore::open(&arguments.source)?;

	let options = MergeOptions {
		zoom: arguments.zoom.to_range()?,
		no_overwrite: arguments.no_overwrite,
		flip_y: arguments.flip_y,
		delete_source: arguments.delete_source,
		check_source: arguments.check,
		pipeline: TransformPipeline::from_commands(arguments.execute.clone()),
		pool_size: arguments.poolsize,
		chunk_size: arguments.chunk_size,
		skip_analyze: arguments.skip_analyze,
		skip_vacuum: arguments.skip_vacuum,
	};

	merge_stores(&destination, &source, &options, Some(&QuickCheckValidator))?;
	Ok(())
}
