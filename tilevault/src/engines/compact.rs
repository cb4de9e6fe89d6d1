//! Converts a flat tile store into the deduplicated normalized form.
//!
//! Compaction streams the flat `tiles` table in chunks, content-addresses
//! every row (optionally after a transform pipeline), inserts each distinct
//! content once into `images` and points the coordinate's `map` row at it.
//! Once all rows are migrated, the flat table is dropped and replaced by
//! the compatibility view. Running it on an already-normalized store is a
//! no-op.

use crate::store::{StoreShape, TilesetStore, schema};
use crate::stream::scan_in_chunks;
use crate::transform::{TransformPipeline, apply_pipeline};
use anyhow::Result;
use r2d2_sqlite::rusqlite::params;
use tilevault_core::{Blob, ContentHash, Progress, ZoomRange};

/// Options for [`compact_store`].
#[derive(Debug, Clone)]
pub struct CompactOptions {
	/// Optional transform applied to every tile before hashing; the
	/// coordinate ends up pointing at the post-transform content.
	pub pipeline: Option<TransformPipeline>,
	/// Rows fetched per chunk.
	pub chunk_size: i64,
}

impl Default for CompactOptions {
	fn default() -> Self {
		CompactOptions {
			pipeline: None,
			chunk_size: 100,
		}
	}
}

/// Counters reported by [`compact_store`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
	/// Rows migrated from the flat table.
	pub processed: u64,
	/// Distinct contents stored.
	pub unique: u64,
	/// Rows whose content already existed.
	pub duplicates: u64,
}

/// Convert `store` from flat to normalized shape, in place.
///
/// Idempotent: an already-normalized store is left untouched. All changes
/// commit in a single transaction at the end.
pub fn compact_store(store: &TilesetStore, options: &CompactOptions) -> Result<CompactStats> {
	log::info!("compacting tile store {:?}", store.path());

	if store.shape()? == StoreShape::Normalized {
		log::info!("the tile store is already in normalized form");
		return Ok(CompactStats::default());
	}

	let format = store.metadata_value("format")?.unwrap_or_else(|| String::from("png"));
	let total = store.count_tiles(&ZoomRange::full())?;
	let max_rowid = store.max_rowid("tiles")?;
	log::debug!("{total} tiles to compact");

	let conn = store.conn()?;
	let tx = conn.unchecked_transaction()?;
	schema::prepare_normalized(&tx)?;

	let mut stats = CompactStats::default();
	let mut progress = Progress::new("compacting", total);

	{
		let mut insert_image = tx.prepare("INSERT OR IGNORE INTO images (tile_id, tile_data) VALUES (?1, ?2)")?;
		let mut replace_map =
			tx.prepare("REPLACE INTO map (zoom_level, tile_column, tile_row, tile_id) VALUES (?1, ?2, ?3, ?4)")?;

		scan_in_chunks(
			&tx,
			"SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles WHERE rowid > ?1 AND rowid <= ?2",
			&[],
			max_rowid,
			options.chunk_size,
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
					let mut blob = Blob::from(data);
					if let Some(pipeline) = &options.pipeline {
						blob = apply_pipeline(pipeline, &format, &blob)?.blob;
					}

					let id = ContentHash::of(blob.as_slice());
					if insert_image.execute(params![id.as_str(), blob.as_slice()])? > 0 {
						stats.unique += 1;
					} else {
						stats.duplicates += 1;
					}
					replace_map.execute(params![level, x, y, id.as_str()])?;

					if progress.inc() {
						progress.log(&format!(", {} unique, {} duplicates", stats.unique, stats.duplicates));
					}
				}
				Ok(())
			},
		)?;
	}

	schema::finalize_normalized(&tx)?;
	tx.commit()?;

	stats.processed = progress.count();
	progress.finish(&format!(", {} unique, {} duplicates", stats.unique, stats.duplicates));
	Ok(stats)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;
	use assert_fs::TempDir;
	use tilevault_core::ContentHash;

	#[test]
	fn deduplicates_shared_content() -> Result<()> {
		let dir = TempDir::new()?;
		let store = testing::flat_store(
			&dir.path().join("flat.mbtiles"),
			Some("png"),
			&[(0, 0, 0, b"A"), (1, 0, 0, b"A"), (1, 1, 0, b"B")],
		)?;

		let stats = compact_store(&store, &CompactOptions::default())?;
		assert_eq!(stats.processed, 3);
		assert_eq!(stats.unique, 2);
		assert_eq!(stats.duplicates, 1);

		assert_eq!(store.shape()?, StoreShape::Normalized);
		assert_eq!(testing::table_count(&store, "images")?, 2);
		assert_eq!(testing::table_count(&store, "map")?, 3);

		// the shared content is referenced by both coordinates
		assert_eq!(
			testing::mapped_hash(&store, 0, 0, 0)?,
			testing::mapped_hash(&store, 1, 0, 0)?
		);
		assert_eq!(testing::mapped_hash(&store, 0, 0, 0)?, ContentHash::of(b"A").as_str());
		Ok(())
	}

	#[test]
	fn view_preserves_the_coordinate_set() -> Result<()> {
		let dir = TempDir::new()?;
		let tiles: &[testing::FixtureTile] = &[(0, 0, 0, b"A"), (1, 0, 0, b"A"), (1, 1, 0, b"B")];
		let store = testing::flat_store(&dir.path().join("flat.mbtiles"), Some("png"), tiles)?;

		compact_store(&store, &CompactOptions::default())?;

		let rows = testing::view_rows(&store)?;
		assert_eq!(
			rows,
			vec![
				(0, 0, 0, b"A".to_vec()),
				(1, 0, 0, b"A".to_vec()),
				(1, 1, 0, b"B".to_vec()),
			]
		);
		Ok(())
	}

	#[test]
	fn compaction_is_idempotent() -> Result<()> {
		let dir = TempDir::new()?;
		let store = testing::flat_store(
			&dir.path().join("flat.mbtiles"),
			Some("png"),
			&[(0, 0, 0, b"A"), (1, 0, 0, b"A")],
		)?;

		compact_store(&store, &CompactOptions::default())?;
		let rows_before = testing::view_rows(&store)?;
		let images_before = testing::table_count(&store, "images")?;

		let stats = compact_store(&store, &CompactOptions::default())?;
		assert_eq!(stats, CompactStats::default());
		assert_eq!(testing::view_rows(&store)?, rows_before);
		assert_eq!(testing::table_count(&store, "images")?, images_before);
		Ok(())
	}

	#[test]
	fn pipeline_is_applied_before_hashing() -> Result<()> {
		let dir = TempDir::new()?;
		let store = testing::flat_store(
			&dir.path().join("flat.mbtiles"),
			Some("png"),
			&[(0, 0, 0, b"A"), (1, 0, 0, b"A")],
		)?;

		let options = CompactOptions {
			pipeline: Some(TransformPipeline::new(vec!["printf x >> {}".to_string()])),
			..CompactOptions::default()
		};
		let stats = compact_store(&store, &options)?;
		assert_eq!(stats.unique, 1);
		assert_eq!(stats.duplicates, 1);

		// both rows were transformed to the same content and share one hash
		assert_eq!(
			testing::mapped_hash(&store, 0, 0, 0)?,
			ContentHash::of(b"Ax").as_str()
		);
		let rows = testing::view_rows(&store)?;
		assert_eq!(rows[0].3, b"Ax".to_vec());
		assert_eq!(rows[1].3, b"Ax".to_vec());
		Ok(())
	}

	#[test]
	fn small_chunks_cover_every_row() -> Result<()> {
		let dir = TempDir::new()?;
		let tiles: Vec<(u8, u32, u32, &[u8])> = (0..7u32).map(|x| (3u8, x, 0u32, &b"C"[..])).collect();
		let store = testing::flat_store(&dir.path().join("flat.mbtiles"), Some("png"), &tiles)?;

		let options = CompactOptions {
			chunk_size: 2,
			..CompactOptions::default()
		};
		let stats = compact_store(&store, &options)?;
		assert_eq!(stats.processed, 7);
		assert_eq!(stats.unique, 1);
		assert_eq!(stats.duplicates, 6);
		assert_eq!(testing::table_count(&store, "map")?, 7);
		Ok(())
	}
}
