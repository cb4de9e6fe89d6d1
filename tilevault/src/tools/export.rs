use super::ZoomArgs;
use anyhow::Result;
use std::path::PathBuf;
use tilevault::{ExportOptions, TilesetStore, TransformPipeline, export_store};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// the tile store to export
	#[arg()]
	file: PathBuf,

	/// the directory receiving `metadata.json` and the tile tree
	#[arg()]
	directory: PathBuf,

	#[command(flatten)]
	zoom: ZoomArgs,

	/// leave tile files that already exist untouched
	#[arg(long, display_order = 2)]
	no_overwrite: bool,

	/// flip the row axis before computing file paths
	#[arg(long, display_order = 2)]
	flip_y: bool,

	/// delete the exported tiles from the store afterwards
	#[arg(long, display_order = 2)]
	delete_source: bool,

	/// shell command run on every tile before writing; `{}` is replaced by
	/// the tile's temp file path (repeatable)
	#[arg(long = "execute", short = 'x', value_name = "COMMAND", display_order = 3)]
	execute: Vec<String>,

	/// number of rows fetched per chunk
	#[arg(long, value_name = "int", default_value_t = 100, display_order = 3)]
	chunk_size: i64,

	/// skip ANALYZE after deleting from the store
	#[arg(long, display_order = 4)]
	skip_analyze: bool,

	/// skip VACUUM after deleting from the store
	#[arg(long, display_order = 4)]
	skip_vacuum: bool,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let store = TilesetStore::open(&arguments.file)?;

	let options = ExportOptions {
		zoom: arguments.zoom.to_range()?,
		no_overwrite: arguments.no_overwrite,
		flip_y: arguments.flip_y,
		delete_source: arguments.delete_source,
		pipeline: TransformPipeline::from_commands(arguments.execute.clone()),
		chunk_size: arguments.chunk_size,
		skip_analyze: arguments.skip_analyze,
		skip_vacuum: arguments.skip_vacuum,
	};

	export_store(&store, &arguments.directory, &options)?;
	Ok(())
}
