//! Reconciles one tile store into another.
//!
//! The receiving store must already be normalized. The sending store may be
//! in either shape, and the engine picks one of three reconciliation paths:
//!
//! 1. normalized source with a transform pipeline — tile contents are
//!    transformed on a worker pool, one task per distinct source hash and
//!    chunk, with a source→destination hash cache avoiding re-transforms;
//! 2. normalized source without a pipeline — contents are copied under a
//!    freshly computed hash, single-threaded, with the same cache;
//! 3. flat source — rows are read directly, transformed inline when a
//!    pipeline is configured, and deduplicated through a seen-hash set.
//!
//! Destination changes commit in one transaction at the very end; deleting
//! the merged range from the source afterwards commits separately.

use crate::pool::TransformPool;
use crate::store::{StoreShape, TilesetStore};
use crate::stream::scan_in_chunks;
use crate::transform::{TransformPipeline, TransformTask, apply_pipeline};
use crate::validate::StoreValidator;
use anyhow::{Context, Result, ensure};
use r2d2_sqlite::rusqlite::{Connection, Statement, params};
use std::collections::{HashMap, HashSet};
use tilevault_core::{Blob, ContentHash, Progress, TileCoord, ZoomRange};

/// Options for [`merge_stores`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
	/// Zoom levels taken from the source.
	pub zoom: ZoomRange,
	/// Keep destination tiles that already exist instead of overwriting them.
	pub no_overwrite: bool,
	/// Flip the row axis of source coordinates before writing them.
	pub flip_y: bool,
	/// Delete the merged range from the source afterwards.
	pub delete_source: bool,
	/// Run the integrity validator on the source before touching the
	/// destination.
	pub check_source: bool,
	/// Optional transform applied to source tile contents.
	pub pipeline: Option<TransformPipeline>,
	/// Worker count for the transform pool; `None` uses the hardware default.
	pub pool_size: Option<usize>,
	/// Rows fetched per chunk.
	pub chunk_size: i64,
	/// Skip ANALYZE after deleting from the source.
	pub skip_analyze: bool,
	/// Skip VACUUM after deleting from the source.
	pub skip_vacuum: bool,
}

impl Default for MergeOptions {
	fn default() -> Self {
		MergeOptions {
			zoom: ZoomRange::full(),
			no_overwrite: false,
			flip_y: false,
			delete_source: false,
			check_source: false,
			pipeline: None,
			pool_size: None,
			chunk_size: 100,
			skip_analyze: false,
			skip_vacuum: false,
		}
	}
}

/// Counters reported by [`merge_stores`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
	/// Mapping rows written into the destination.
	pub merged: u64,
	/// Source tiles skipped because the destination already held them.
	pub skipped: u64,
}

/// Destination coordinates already present, indexed zoom → row → columns
/// for O(1) membership checks during the merge.
#[derive(Default)]
struct CoordIndex(HashMap<u8, HashMap<u32, HashSet<u32>>>);

impl CoordIndex {
	fn insert(&mut self, coord: &TileCoord) {
		self
			.0
			.entry(coord.level)
			.or_default()
			.entry(coord.y)
			.or_default()
			.insert(coord.x);
	}

	fn contains(&self, coord: &TileCoord) -> bool {
		self
			.0
			.get(&coord.level)
			.and_then(|rows| rows.get(&coord.y))
			.is_some_and(|columns| columns.contains(&coord.x))
	}
}

const SELECT_NORMALIZED: &str = "SELECT map.zoom_level, map.tile_column, map.tile_row, map.tile_id, images.tile_data \
	FROM map JOIN images ON images.tile_id = map.tile_id \
	WHERE map.rowid > ?1 AND map.rowid <= ?2 AND map.zoom_level >= ?3 AND map.zoom_level <= ?4";

const SELECT_FLAT: &str = "SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles \
	WHERE rowid > ?1 AND rowid <= ?2 AND zoom_level >= ?3 AND zoom_level <= ?4";

/// Merge `source` into `destination`.
///
/// The validator is only consulted when `options.check_source` is set;
/// requesting a check without wiring a validator is an error. All
/// preconditions are verified before the destination is touched.
pub fn merge_stores(
	destination: &TilesetStore,
	source: &TilesetStore,
	options: &MergeOptions,
	validator: Option<&dyn StoreValidator>,
) -> Result<MergeStats> {
	log::info!("merging {:?} into {:?}", source.path(), destination.path());

	if options.check_source {
		let validator = validator.context("a pre-merge check was requested but no validator is configured")?;
		ensure!(
			validator.validate(source, &options.zoom)?,
			"the pre-merge check on {:?} failed",
			source.path()
		);
	}

	ensure!(
		destination.shape()? == StoreShape::Normalized,
		"the destination store must be normalized before merging; compact it first"
	);
	let source_shape = source.shape()?;

	// the stores must agree on the image format; a destination without one
	// adopts the source's
	let destination_format = destination.metadata_value("format")?;
	let source_format = source.metadata_value("format")?;
	if let (Some(dst), Some(src)) = (&destination_format, &source_format) {
		ensure!(dst == src, "the stores use different image formats ({dst} vs {src})");
	}
	if destination_format.is_none() {
		if let Some(format) = &source_format {
			destination.set_metadata_if_absent("format", format)?;
		}
	}
	let format = source_format
		.or(destination_format)
		.unwrap_or_else(|| String::from("png"));

	let existing = if options.no_overwrite {
		Some(load_existing(destination, &options.zoom)?)
	} else {
		None
	};

	let total = source.count_tiles(&options.zoom)?;
	log::debug!("{total} tiles to merge");

	let max_rowid = match source_shape {
		StoreShape::Normalized => source.max_rowid("map")?,
		StoreShape::Flat => source.max_rowid("tiles")?,
	};

	let destination_conn = destination.conn()?;
	let source_conn = source.conn()?;
	let tx = destination_conn.unchecked_transaction()?;

	let mut run = MergeRun {
		options,
		format,
		existing,
		replace_image: tx.prepare("REPLACE INTO images (tile_id, tile_data) VALUES (?1, ?2)")?,
		replace_map: tx.prepare("REPLACE INTO map (zoom_level, tile_column, tile_row, tile_id) VALUES (?1, ?2, ?3, ?4)")?,
		progress: Progress::new("merging", total),
		stats: MergeStats::default(),
	};

	match (source_shape, &options.pipeline) {
		(StoreShape::Normalized, Some(pipeline)) => run.merge_normalized_pooled(&source_conn, max_rowid, pipeline)?,
		(StoreShape::Normalized, None) => run.merge_normalized_copy(&source_conn, max_rowid)?,
		(StoreShape::Flat, pipeline) => run.merge_flat(&source_conn, max_rowid, pipeline.as_ref())?,
	}

	let stats = run.finish();
	tx.commit()?;

	if options.delete_source {
		log::warn!("removing merged tiles from {:?}", source.path());
		source.delete_zoom_range(&options.zoom)?;
		source.optimize(options.skip_analyze, options.skip_vacuum)?;
	}

	Ok(stats)
}

fn load_existing(destination: &TilesetStore, zoom: &ZoomRange) -> Result<CoordIndex> {
	let conn = destination.conn()?;
	let mut stmt = conn.prepare(
		"SELECT zoom_level, tile_column, tile_row FROM tiles WHERE zoom_level >= ?1 AND zoom_level <= ?2",
	)?;
	let rows = stmt.query_map(params![zoom.min, zoom.max], |row| {
		Ok((row.get::<_, u8>(0)?, row.get::<_, u32>(1)?, row.get::<_, u32>(2)?))
	})?;

	let mut index = CoordIndex::default();
	for row in rows {
		let (level, x, y) = row?;
		index.insert(&TileCoord::new(level, x, y)?);
	}
	Ok(index)
}

/// State threaded through one merge call: the destination write statements,
/// the no-overwrite index and the running counters.
struct MergeRun<'a> {
	options: &'a MergeOptions,
	format: String,
	existing: Option<CoordIndex>,
	replace_image: Statement<'a>,
	replace_map: Statement<'a>,
	progress: Progress,
	stats: MergeStats,
}

impl MergeRun<'_> {
	/// The destination coordinate of a source row, with the axis flip applied.
	fn target_coord(&self, level: u8, x: u32, y: u32) -> Result<TileCoord> {
		let mut coord = TileCoord::new(level, x, y)?;
		if self.options.flip_y {
			coord.flip_y();
		}
		Ok(coord)
	}

	fn should_skip(&mut self, coord: &TileCoord) -> bool {
		if let Some(existing) = &self.existing {
			if existing.contains(coord) {
				log::trace!("ignoring existing tile {coord:?}");
				self.stats.skipped += 1;
				return true;
			}
		}
		false
	}

	fn write_image(&mut self, id: &ContentHash, blob: &Blob) -> Result<()> {
		self.replace_image.execute(params![id.as_str(), blob.as_slice()])?;
		Ok(())
	}

	fn write_map(&mut self, coord: &TileCoord, id: &ContentHash) -> Result<()> {
		self
			.replace_map
			.execute(params![coord.level, coord.x, coord.y, id.as_str()])?;
		self.stats.merged += 1;
		if self.progress.inc() {
			self.progress.log("");
		}
		Ok(())
	}

	/// Path 1: normalized source, transform pipeline, worker pool.
	///
	/// Each chunk enqueues one task per distinct source hash not yet in the
	/// cache; coordinates sharing that hash fan out into mapping rows once
	/// the batch has returned from the pool.
	fn merge_normalized_pooled(
		&mut self,
		source: &Connection,
		max_rowid: i64,
		pipeline: &TransformPipeline,
	) -> Result<()> {
		let pool = TransformPool::new(self.options.pool_size)?;
		let mut cache: HashMap<ContentHash, ContentHash> = HashMap::new();
		let (zoom_min, zoom_max) = (self.options.zoom.min, self.options.zoom.max);
		let chunk_size = self.options.chunk_size;

		scan_in_chunks(
			source,
			SELECT_NORMALIZED,
			&[&zoom_min, &zoom_max],
			max_rowid,
			chunk_size,
			map_normalized_row,
			|chunk| {
				let mut tasks: Vec<TransformTask> = Vec::new();
				let mut pending: HashMap<ContentHash, Vec<TileCoord>> = HashMap::new();

				for (level, x, y, id, data) in chunk {
					let id = ContentHash::from(id);
					let coord = self.target_coord(level, x, y)?;
					if self.should_skip(&coord) {
						continue;
					}

					if let Some(new_id) = cache.get(&id) {
						let new_id = new_id.clone();
						self.write_map(&coord, &new_id)?;
					} else if let Some(coords) = pending.get_mut(&id) {
						coords.push(coord);
					} else {
						tasks.push(TransformTask::new(id.clone(), &self.format, &Blob::from(data))?);
						pending.insert(id, vec![coord]);
					}
				}

				if tasks.is_empty() {
					return Ok(());
				}

				for outcome in pool.run(tasks, pipeline) {
					let source_id = outcome.id.clone();
					let coords = pending.remove(&source_id).unwrap_or_default();
					let result = outcome.into_result()?;
					if result.blob.is_empty() {
						log::warn!(
							"transform produced no content for {} tile(s); keeping the destination untouched",
							coords.len()
						);
						continue;
					}

					let new_id = ContentHash::of(result.blob.as_slice());
					self.write_image(&new_id, &result.blob)?;
					for coord in &coords {
						self.write_map(coord, &new_id)?;
					}
					cache.insert(source_id, new_id);
				}
				Ok(())
			},
		)
	}

	/// Path 2: normalized source, no pipeline, single-threaded copy.
	///
	/// Unseen source hashes are stored under a freshly recomputed hash of
	/// the unchanged bytes; every row writes its mapping.
	fn merge_normalized_copy(&mut self, source: &Connection, max_rowid: i64) -> Result<()> {
		let mut cache: HashMap<ContentHash, ContentHash> = HashMap::new();
		let (zoom_min, zoom_max) = (self.options.zoom.min, self.options.zoom.max);
		let chunk_size = self.options.chunk_size;

		scan_in_chunks(
			source,
			SELECT_NORMALIZED,
			&[&zoom_min, &zoom_max],
			max_rowid,
			chunk_size,
			map_normalized_row,
			|chunk| {
				for (level, x, y, id, data) in chunk {
					let id = ContentHash::from(id);
					let coord = self.target_coord(level, x, y)?;
					if self.should_skip(&coord) {
						continue;
					}

					let new_id = match cache.get(&id) {
						Some(new_id) => new_id.clone(),
						None => {
							let blob = Blob::from(data);
							let new_id = ContentHash::of(blob.as_slice());
							self.write_image(&new_id, &blob)?;
							cache.insert(id, new_id.clone());
							new_id
						}
					};
					self.write_map(&coord, &new_id)?;
				}
				Ok(())
			},
		)
	}

	/// Path 3: flat source. Transforms run inline when configured; a
	/// seen-hash set avoids redundant content writes (the source rows carry
	/// no identity of their own to cache against).
	fn merge_flat(&mut self, source: &Connection, max_rowid: i64, pipeline: Option<&TransformPipeline>) -> Result<()> {
		let mut seen: HashSet<ContentHash> = HashSet::new();
		let (zoom_min, zoom_max) = (self.options.zoom.min, self.options.zoom.max);
		let chunk_size = self.options.chunk_size;

		scan_in_chunks(
			source,
			SELECT_FLAT,
			&[&zoom_min, &zoom_max],
			max_rowid,
			chunk_size,
			|row| {
				Ok((
					row.get::<_, u8>(0)?,
					row.get::<_, u32>(1)?,
					row.get::<_, u32>(2)?,
					row.get::<_, Vec<u8>>(3)?,
				))
			},
			|chunk| {
				for (level, x, y, data) in chunk {
					let coord = self.target_coord(level, x, y)?;
					if self.should_skip(&coord) {
						continue;
					}

					let mut blob = Blob::from(data);
					if let Some(pipeline) = pipeline {
						blob = apply_pipeline(pipeline, &self.format, &blob)?.blob;
					}

					let id = ContentHash::of(blob.as_slice());
					if seen.insert(id.clone()) {
						self.write_image(&id, &blob)?;
					}
					self.write_map(&coord, &id)?;
				}
				Ok(())
			},
		)
	}

	fn finish(self) -> MergeStats {
		self.progress.finish("");
		self.stats
	}
}

type NormalizedRow = (u8, u32, u32, String, Vec<u8>);

fn map_normalized_row(row: &r2d2_sqlite::rusqlite::Row<'_>) -> r2d2_sqlite::rusqlite::Result<NormalizedRow> {
	Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}
