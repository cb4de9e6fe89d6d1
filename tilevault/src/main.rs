mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Create a new empty tile store
	Create(tools::create::Subcommand),

	/// Deduplicate a tile store in place
	Compact(tools::compact::Subcommand),

	/// Merge one tile store into another
	Merge(tools::merge::Subcommand),

	/// Export a tile store into a directory tree
	Export(tools::export::Subcommand),

	#[clap(alias = "process")]
	/// Rewrite stored tile contents through external commands
	Rewrite(tools::rewrite::Subcommand),

	/// Run ANALYZE and VACUUM on a tile store
	Optimize(tools::optimize::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Create(arguments) => tools::create::run(arguments),
		Commands::Compact(arguments) => tools::compact::run(arguments),
		Commands::Merge(arguments) => tools::merge::run(arguments),
		Commands::Export(arguments) => tools::export::run(arguments),
		Commands::Rewrite(arguments) => tools::rewrite::run(arguments),
		Commands::Optimize(arguments) => tools::optimize::run(arguments),
	}
}

#[cfg(test)]
mod tests {
	use crate::{Cli, run};
	use anyhow::Result;
	use clap::Parser;

	pub fn run_command(arg_vec: Vec<&str>) -> Result<String> {
		let cli = Cli::try_parse_from(arg_vec)?;
		let msg = format!("{:?}", cli);
		run(cli)?;
		Ok(msg)
	}

	#[test]
	fn help() {
		let err = run_command(vec!["tilevault"]).unwrap_err().to_string();
		assert!(err.starts_with("A toolbox for compacting, merging, exporting and rewriting map tile databases."));
		assert!(err.contains("\nUsage: tilevault [OPTIONS] <COMMAND>"));
	}

	#[test]
	fn version() {
		let err = run_command(vec!["tilevault", "-V"]).unwrap_err().to_string();
		assert!(err.starts_with("tilevault "));
	}

	#[test]
	fn compact_subcommand() {
		let output = run_command(vec!["tilevault", "compact"]).unwrap_err().to_string();
		assert!(output.starts_with("Deduplicate a tile store in place"));
	}

	#[test]
	fn merge_subcommand() {
		let output = run_command(vec!["tilevault", "merge"]).unwrap_err().to_string();
		assert!(output.starts_with("Merge one tile store into another"));
	}

	#[test]
	fn export_subcommand() {
		let output = run_command(vec!["tilevault", "export"]).unwrap_err().to_string();
		assert!(output.starts_with("Export a tile store into a directory tree"));
	}

	#[test]
	fn rewrite_subcommand() {
		let output = run_command(vec!["tilevault", "rewrite"]).unwrap_err().to_string();
		assert!(output.starts_with("Rewrite stored tile contents through external commands"));
	}
}
