//! Bounded worker pool for external tile transforms.
//!
//! The pool only ever runs [`TransformTask`]s; every database statement
//! stays on the coordinating thread. [`TransformPool::run`] is a synchronous
//! barrier: it returns once the whole batch has finished, so the coordinator
//! can touch its dedup caches and write the results without any locking.
//! A hung external command stalls its worker slot but not the others.

use crate::transform::{TransformOutcome, TransformPipeline, TransformTask};
use anyhow::{Context, Result};
use rayon::prelude::*;

/// A fixed-size thread pool executing transform tasks in parallel.
pub struct TransformPool {
	pool: rayon::ThreadPool,
}

impl TransformPool {
	/// Build a pool of `size` workers; `None` falls back to the available
	/// hardware parallelism.
	pub fn new(size: Option<usize>) -> Result<TransformPool> {
		let size = size.unwrap_or_else(num_cpus::get).max(1);
		log::debug!("using transform pool size = {size}");

		let pool = rayon::ThreadPoolBuilder::new()
			.num_threads(size)
			.build()
			.context("building the transform worker pool")?;
		Ok(TransformPool { pool })
	}

	/// Number of workers.
	#[must_use]
	pub fn size(&self) -> usize {
		self.pool.current_num_threads()
	}

	/// Execute the whole batch in parallel and wait for every task to
	/// finish before returning. Outcomes keep the batch order.
	#[must_use]
	pub fn run(&self, tasks: Vec<TransformTask>, pipeline: &TransformPipeline) -> Vec<TransformOutcome> {
		self
			.pool
			.install(|| tasks.into_par_iter().map(|task| task.execute(pipeline)).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tilevault_core::{Blob, ContentHash};

	#[test]
	fn default_size_is_positive() -> Result<()> {
		let pool = TransformPool::new(None)?;
		assert!(pool.size() >= 1);
		Ok(())
	}

	#[test]
	fn explicit_size_is_honored() -> Result<()> {
		let pool = TransformPool::new(Some(3))?;
		assert_eq!(pool.size(), 3);
		Ok(())
	}

	#[test]
	fn batch_runs_to_completion_in_order() -> Result<()> {
		let pool = TransformPool::new(Some(2))?;
		let pipeline = TransformPipeline::new(vec!["printf _ >> {}".to_string()]);

		let payloads: Vec<Vec<u8>> = (0..5u8).map(|n| vec![n; 3]).collect();
		let tasks = payloads
			.iter()
			.map(|bytes| {
				let blob = Blob::from(bytes.clone());
				TransformTask::new(ContentHash::of(bytes), "png", &blob)
			})
			.collect::<Result<Vec<_>>>()?;

		let outcomes = pool.run(tasks, &pipeline);
		assert_eq!(outcomes.len(), 5);

		for (outcome, bytes) in outcomes.into_iter().zip(payloads) {
			assert_eq!(outcome.id, ContentHash::of(&bytes));
			let result = outcome.into_result()?;
			assert!(result.succeeded);
			let mut expected = bytes.clone();
			expected.push(b'_');
			assert_eq!(result.blob.as_slice(), expected.as_slice());
		}
		Ok(())
	}
}
