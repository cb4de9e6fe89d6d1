//! Rewrites every distinct tile content in a normalized store, in place.
//!
//! The engine streams `map ⋈ images` in chunks and keeps a seen-hash set
//! for the whole operation, so each distinct content is pushed through the
//! transform pipeline exactly once no matter how many coordinates reference
//! it. After a chunk's pool batch returns, every result is re-hashed,
//! stored, and all mappings of the old hash are repointed to the new one;
//! the old content row is dropped once nothing references it. Each chunk
//! commits on its own, so finished work survives a later failure.

use crate::pool::TransformPool;
use crate::store::{StoreShape, TilesetStore};
use crate::stream::scan_in_chunks;
use crate::transform::{TransformPipeline, TransformTask};
use anyhow::{Result, ensure};
use r2d2_sqlite::rusqlite::params;
use std::collections::HashSet;
use tilevault_core::{Blob, ContentHash, Progress, ZoomRange};

/// Options for [`rewrite_store`].
#[derive(Debug, Clone)]
pub struct RewriteOptions {
	/// Zoom levels whose contents are rewritten.
	pub zoom: ZoomRange,
	/// The transform to run; an empty pipeline makes the whole call a no-op.
	pub pipeline: TransformPipeline,
	/// Worker count for the transform pool; `None` uses the hardware default.
	pub pool_size: Option<usize>,
	/// Rows fetched per chunk.
	pub chunk_size: i64,
}

impl RewriteOptions {
	/// Options with the given pipeline and defaults for everything else.
	#[must_use]
	pub fn new(pipeline: TransformPipeline) -> RewriteOptions {
		RewriteOptions {
			zoom: ZoomRange::full(),
			pipeline,
			pool_size: None,
			chunk_size: 1000,
		}
	}
}

/// Counters reported by [`rewrite_store`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
	/// Distinct contents pushed through the pipeline.
	pub rewritten: u64,
	/// Mapping rows sharing an already-rewritten content.
	pub duplicates: u64,
}

/// Rewrite the contents of `store` through the configured pipeline.
pub fn rewrite_store(store: &TilesetStore, options: &RewriteOptions) -> Result<RewriteStats> {
	log::info!("rewriting tile contents of {:?}", store.path());

	if options.pipeline.is_empty() {
		log::info!("no transform commands configured; nothing to do");
		return Ok(RewriteStats::default());
	}
	ensure!(
		store.shape()? == StoreShape::Normalized,
		"the tile store must be normalized before rewriting; compact it first"
	);

	let format = store.metadata_value("format")?.unwrap_or_else(|| String::from("png"));
	let conn = store.conn()?;

	// speeds up the repointing updates below
	conn.execute_batch("CREATE INDEX IF NOT EXISTS tile_id_index ON map (tile_id)")?;

	let total: u64 = conn.query_row(
		"SELECT count(DISTINCT tile_id) FROM map WHERE zoom_level >= ?1 AND zoom_level <= ?2",
		params![options.zoom.min, options.zoom.max],
		|row| row.get::<_, i64>(0).map(|count| count as u64),
	)?;
	let max_rowid = store.max_rowid("map")?;
	log::debug!("{total} distinct contents to rewrite");

	let pool = TransformPool::new(options.pool_size)?;
	let mut seen: HashSet<ContentHash> = HashSet::new();
	let mut stats = RewriteStats::default();
	let mut progress = Progress::new("rewriting", total);

	scan_in_chunks(
		&conn,
		"SELECT images.tile_id, images.tile_data \
		FROM map JOIN images ON images.tile_id = map.tile_id \
		WHERE map.rowid > ?1 AND map.rowid <= ?2 AND map.zoom_level >= ?3 AND map.zoom_level <= ?4",
		&[&options.zoom.min, &options.zoom.max],
		max_rowid,
		options.chunk_size,
		|row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
		|chunk| {
			let mut tasks: Vec<TransformTask> = Vec::new();
			for (id, data) in chunk {
				let id = ContentHash::from(id);
				if seen.contains(&id) {
					stats.duplicates += 1;
					continue;
				}
				seen.insert(id.clone());
				tasks.push(TransformTask::new(id, &format, &Blob::from(data))?);
			}
			if tasks.is_empty() {
				return Ok(());
			}

			let outcomes = pool.run(tasks, &options.pipeline);

			// finished chunks stay committed even if a later one fails
			let tx = conn.unchecked_transaction()?;
			{
				let mut insert_image = tx.prepare("INSERT OR IGNORE INTO images (tile_id, tile_data) VALUES (?1, ?2)")?;
				let mut repoint_map = tx.prepare("UPDATE map SET tile_id = ?1 WHERE tile_id = ?2")?;
				let mut delete_image = tx.prepare("DELETE FROM images WHERE tile_id = ?1")?;

				for outcome in outcomes {
					let old_id = outcome.id.clone();
					let result = outcome.into_result()?;
					if result.blob.is_empty() {
						log::warn!("transform produced no content for {old_id}; keeping the stored tile");
					} else {
						let new_id = ContentHash::of(result.blob.as_slice());
						insert_image.execute(params![new_id.as_str(), result.blob.as_slice()])?;
						repoint_map.execute(params![new_id.as_str(), old_id.as_str()])?;
						if new_id != old_id {
							delete_image.execute(params![old_id.as_str()])?;
						}
						// repointed rows surface the new hash in later chunk
						// windows; marking it seen keeps the transform
						// at-most-once per content
						seen.insert(new_id);
					}

					if progress.inc() {
						progress.log(&format!(", {} duplicates skipped", stats.duplicates));
					}
				}
			}
			tx.commit()?;
			Ok(())
		},
	)?;

	stats.rewritten = progress.count();
	progress.finish(&format!(", {} duplicates skipped", stats.duplicates));
	Ok(stats)
}
