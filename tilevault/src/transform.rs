//! External transform pipelines applied to tile bytes through temp files.
//!
//! A pipeline is an ordered list of shell command templates. Each template
//! carries one `{}` substitution point that receives the absolute path of a
//! temp file holding the current tile bytes; the commands run in order
//! against the same file, and whatever they leave on disk becomes the
//! transformed content. Exit statuses are recorded and surfaced as warnings
//! but do not fail the operation — the contract is best effort, and callers
//! that want stricter behavior can inspect [`TransformOutcome::succeeded`].
//!
//! Temp files are owned by [`TransformTask`] values and removed when the
//! outcome is consumed, on every path.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;
use tilevault_core::{Blob, ContentHash};

/// An ordered sequence of external command templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformPipeline {
	commands: Vec<String>,
}

impl TransformPipeline {
	/// Build a pipeline from command templates, run in the given order.
	#[must_use]
	pub fn new(commands: Vec<String>) -> TransformPipeline {
		TransformPipeline { commands }
	}

	/// CLI helper: an empty command list means no pipeline at all.
	#[must_use]
	pub fn from_commands(commands: Vec<String>) -> Option<TransformPipeline> {
		if commands.is_empty() {
			None
		} else {
			Some(TransformPipeline::new(commands))
		}
	}

	/// Whether the pipeline has no commands.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Run every command against `path`, in order. Returns whether all
	/// commands succeeded and the first failure diagnostic, if any.
	fn run_on_file(&self, path: &Path) -> (bool, Option<String>) {
		let path_str = path.to_string_lossy();
		let mut succeeded = true;
		let mut diagnostic = None;

		for template in &self.commands {
			let command = template.replace("{}", &path_str);
			log::trace!("running `{command}`");

			let failure = match Command::new("sh").arg("-c").arg(&command).status() {
				Ok(status) if status.success() => None,
				Ok(status) => Some(format!("`{command}` exited with {status}")),
				Err(err) => Some(format!("`{command}` failed to start: {err}")),
			};
			if let Some(message) = failure {
				log::warn!("tile transform: {message}");
				if succeeded {
					succeeded = false;
					diagnostic = Some(message);
				}
			}
		}
		(succeeded, diagnostic)
	}
}

/// One self-contained unit of transform work: a content hash key and a temp
/// file holding the bytes to transform. Tasks carry no shared state and can
/// run on any worker.
pub struct TransformTask {
	/// The content hash the coordinator will match the outcome back to.
	pub id: ContentHash,
	file: NamedTempFile,
}

impl TransformTask {
	/// Write `blob` into a fresh temp file named after the image `format`.
	///
	/// # Errors
	/// Returns an error if the temp file cannot be created or written.
	pub fn new(id: ContentHash, format: &str, blob: &Blob) -> Result<TransformTask> {
		let mut file = tempfile::Builder::new()
			.prefix("tile_")
			.suffix(&format!(".{format}"))
			.tempfile()
			.context("creating a temp file for the tile transform")?;
		file.write_all(blob.as_slice())?;
		file.flush()?;
		Ok(TransformTask { id, file })
	}

	/// Run the pipeline against this task's file. Runs on a pool worker;
	/// the coordinator reads the outcome back after the batch barrier.
	#[must_use]
	pub fn execute(self, pipeline: &TransformPipeline) -> TransformOutcome {
		let (succeeded, diagnostic) = pipeline.run_on_file(self.file.path());
		TransformOutcome {
			id: self.id,
			file: self.file,
			succeeded,
			diagnostic,
		}
	}
}

/// The result of running a pipeline over one task's file, before the bytes
/// have been read back.
pub struct TransformOutcome {
	/// The content hash of the original bytes.
	pub id: ContentHash,
	file: NamedTempFile,
	/// Whether every command exited successfully.
	pub succeeded: bool,
	/// The first failure, if any.
	pub diagnostic: Option<String>,
}

impl TransformOutcome {
	/// Read the transformed bytes and delete the temp file.
	///
	/// # Errors
	/// Returns an error if the file cannot be read back.
	pub fn into_result(self) -> Result<TransformResult> {
		let bytes = fs::read(self.file.path()).context("reading back the transformed tile")?;
		Ok(TransformResult {
			blob: Blob::from(bytes),
			succeeded: self.succeeded,
			diagnostic: self.diagnostic,
		})
	}
}

/// Transformed tile bytes plus the command verdict.
#[derive(Debug)]
pub struct TransformResult {
	/// Whatever the commands left on disk, unvalidated.
	pub blob: Blob,
	/// Whether every command exited successfully.
	pub succeeded: bool,
	/// The first failure, if any.
	pub diagnostic: Option<String>,
}

/// Apply `pipeline` to one tile's bytes inline, without a worker pool.
pub fn apply_pipeline(pipeline: &TransformPipeline, format: &str, blob: &Blob) -> Result<TransformResult> {
	TransformTask::new(ContentHash::of(blob.as_slice()), format, blob)?
		.execute(pipeline)
		.into_result()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn task(bytes: &[u8]) -> Result<TransformTask> {
		let blob = Blob::from(bytes);
		TransformTask::new(ContentHash::of(bytes), "png", &blob)
	}

	#[test]
	fn identity_pipeline_passes_bytes_through() -> Result<()> {
		let result = task(b"tile bytes")?
			.execute(&TransformPipeline::new(vec![]))
			.into_result()?;
		assert!(result.succeeded);
		assert_eq!(result.diagnostic, None);
		assert_eq!(result.blob.as_slice(), b"tile bytes");
		Ok(())
	}

	#[test]
	fn commands_run_in_order_on_the_file() -> Result<()> {
		let pipeline = TransformPipeline::new(vec![
			"printf a >> {}".to_string(),
			"printf b >> {}".to_string(),
		]);
		let result = task(b"tile")?.execute(&pipeline).into_result()?;
		assert!(result.succeeded);
		assert_eq!(result.blob.as_slice(), b"tileab");
		Ok(())
	}

	#[test]
	fn failed_commands_are_reported_not_fatal() -> Result<()> {
		let pipeline = TransformPipeline::new(vec!["false".to_string()]);
		let result = task(b"tile")?.execute(&pipeline).into_result()?;
		assert!(!result.succeeded);
		assert!(result.diagnostic.is_some());
		assert_eq!(result.blob.as_slice(), b"tile");
		Ok(())
	}

	#[test]
	fn first_failure_wins_but_all_commands_run() -> Result<()> {
		let pipeline = TransformPipeline::new(vec![
			"false".to_string(),
			"printf x >> {}".to_string(),
		]);
		let result = task(b"t")?.execute(&pipeline).into_result()?;
		assert!(!result.succeeded);
		assert!(result.diagnostic.as_deref().unwrap().contains("false"));
		assert_eq!(result.blob.as_slice(), b"tx");
		Ok(())
	}

	#[test]
	fn temp_file_is_removed_after_consumption() -> Result<()> {
		let task = task(b"tile")?;
		let path = task.file.path().to_path_buf();
		assert!(path.exists());

		let outcome = task.execute(&TransformPipeline::new(vec![]));
		outcome.into_result()?;
		assert!(!path.exists());
		Ok(())
	}

	#[test]
	fn from_commands_treats_empty_as_none() {
		assert_eq!(TransformPipeline::from_commands(vec![]), None);
		let pipeline = TransformPipeline::from_commands(vec!["true".to_string()]).unwrap();
		assert!(!pipeline.is_empty());
	}

	#[test]
	fn apply_pipeline_inline() -> Result<()> {
		let pipeline = TransformPipeline::new(vec!["printf ! >> {}".to_string()]);
		let result = apply_pipeline(&pipeline, "png", &Blob::from(&b"abc"[..]))?;
		assert!(result.succeeded);
		assert_eq!(result.blob.as_slice(), b"abc!");
		Ok(())
	}
}
