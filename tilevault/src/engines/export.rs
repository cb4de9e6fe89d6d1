//! Materializes a tile store into a directory tree.
//!
//! Layout on disk:
//! ```text
//! <root>/metadata.json
//! <root>/tiles/<zoom>/<column>/<row>.<format>
//! ```
//! The sidecar is written first, then tiles stream out in chunks. The
//! engine reads the flat row shape and therefore works on both store
//! shapes; since SQLite views carry no rowid, the chunked scan runs over
//! the shape's backing table.

use crate::store::{StoreShape, TilesetStore};
use crate::stream::scan_in_chunks;
use crate::transform::{TransformPipeline, apply_pipeline};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tilevault_core::{Blob, Progress, TileCoord, ZoomRange};

/// Options for [`export_store`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
	/// Zoom levels to export.
	pub zoom: ZoomRange,
	/// Leave files that already exist on disk untouched.
	pub no_overwrite: bool,
	/// Flip the row axis before computing file paths.
	pub flip_y: bool,
	/// Delete the exported range from the store afterwards.
	pub delete_source: bool,
	/// Optional transform applied to every tile before writing.
	pub pipeline: Option<TransformPipeline>,
	/// Rows fetched per chunk.
	pub chunk_size: i64,
	/// Skip ANALYZE after deleting from the store.
	pub skip_analyze: bool,
	/// Skip VACUUM after deleting from the store.
	pub skip_vacuum: bool,
}

impl Default for ExportOptions {
	fn default() -> Self {
		ExportOptions {
			zoom: ZoomRange::full(),
			no_overwrite: false,
			flip_y: false,
			delete_source: false,
			pipeline: None,
			chunk_size: 100,
			skip_analyze: false,
			skip_vacuum: false,
		}
	}
}

/// Counters reported by [`export_store`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
	/// Tile files written.
	pub exported: u64,
	/// Tiles skipped because their file already existed.
	pub skipped: u64,
}

/// Export `store`'s tiles within the configured zoom range into `directory`.
pub fn export_store(store: &TilesetStore, directory: &Path, options: &ExportOptions) -> Result<ExportStats> {
	log::info!("exporting {:?} to {:?}", store.path(), directory);

	let tiles_root = directory.join("tiles");
	fs::create_dir_all(&tiles_root).with_context(|| format!("creating {tiles_root:?}"))?;

	let metadata: BTreeMap<String, String> = store.metadata()?.into_iter().collect();
	let sidecar = directory.join("metadata.json");
	let file = fs::File::create(&sidecar).with_context(|| format!("creating {sidecar:?}"))?;
	serde_json::to_writer_pretty(file, &metadata)?;

	let format = metadata.get("format").cloned().unwrap_or_else(|| String::from("png"));
	let total = store.count_tiles(&options.zoom)?;
	log::debug!("{total} tiles to export");

	let (sql, table) = match store.shape()? {
		StoreShape::Flat => (
			"SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles \
			WHERE rowid > ?1 AND rowid <= ?2 AND zoom_level >= ?3 AND zoom_level <= ?4",
			"tiles",
		),
		StoreShape::Normalized => (
			"SELECT map.zoom_level, map.tile_column, map.tile_row, images.tile_data \
			FROM map JOIN images ON images.tile_id = map.tile_id \
			WHERE map.rowid > ?1 AND map.rowid <= ?2 AND map.zoom_level >= ?3 AND map.zoom_level <= ?4",
			"map",
		),
	};
	let max_rowid = store.max_rowid(table)?;

	let mut stats = ExportStats::default();
	let mut progress = Progress::new("exporting", total);
	let conn = store.conn()?;

	scan_in_chunks(
		&conn,
		sql,
		&[&options.zoom.min, &options.zoom.max],
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

				let mut coord = TileCoord::new(level, x, y)?;
				if options.flip_y {
					coord.flip_y();
				}

				let tile_path = tiles_root
					.join(coord.level.to_string())
					.join(coord.x.to_string())
					.join(format!("{}.{}", coord.y, format));

				if options.no_overwrite && tile_path.exists() {
					log::trace!("skipping existing {tile_path:?}");
					stats.skipped += 1;
				} else {
					fs::create_dir_all(tile_path.parent().unwrap())?;
					fs::write(&tile_path, blob.as_slice()).with_context(|| format!("writing {tile_path:?}"))?;
					stats.exported += 1;
				}

				if progress.inc() {
					progress.log("");
				}
			}
			Ok(())
		},
	)?;

	progress.finish("");

	if options.delete_source {
		log::warn!("removing exported tiles from {:?}", store.path());
		store.delete_zoom_range(&options.zoom)?;
		store.optimize(options.skip_analyze, options.skip_vacuum)?;
	}

	Ok(stats)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;
	use assert_fs::TempDir;

	fn scenario_store(dir: &TempDir) -> Result<TilesetStore> {
		testing::normalized_store(
			&dir.path().join("store.mbtiles"),
			Some("png"),
			&[(0, 0, 0, b"A"), (1, 0, 0, b"A"), (1, 1, 0, b"B")],
		)
	}

	#[test]
	fn writes_tiles_and_sidecar() -> Result<()> {
		let dir = TempDir::new()?;
		let store = scenario_store(&dir)?;
		let out = dir.path().join("out");

		let stats = export_store(&store, &out, &ExportOptions::default())?;
		assert_eq!(stats.exported, 3);

		assert_eq!(fs::read(out.join("tiles/0/0/0.png"))?, b"A");
		assert_eq!(fs::read(out.join("tiles/1/0/0.png"))?, b"A");
		assert_eq!(fs::read(out.join("tiles/1/1/0.png"))?, b"B");

		let sidecar: BTreeMap<String, String> = serde_json::from_str(&fs::read_to_string(out.join("metadata.json"))?)?;
		assert_eq!(sidecar.get("format").map(String::as_str), Some("png"));
		Ok(())
	}

	#[test]
	fn flip_y_changes_file_rows() -> Result<()> {
		let dir = TempDir::new()?;
		let store = scenario_store(&dir)?;
		let out = dir.path().join("out");

		let options = ExportOptions {
			zoom: ZoomRange::single(1)?,
			flip_y: true,
			..ExportOptions::default()
		};
		let stats = export_store(&store, &out, &options)?;
		assert_eq!(stats.exported, 2);

		assert_eq!(fs::read(out.join("tiles/1/0/1.png"))?, b"A");
		assert_eq!(fs::read(out.join("tiles/1/1/1.png"))?, b"B");
		assert!(!out.join("tiles/0").exists());
		Ok(())
	}

	#[test]
	fn works_on_flat_stores() -> Result<()> {
		let dir = TempDir::new()?;
		let store = testing::flat_store(
			&dir.path().join("flat.mbtiles"),
			Some("png"),
			&[(0, 0, 0, b"A"), (1, 1, 0, b"B")],
		)?;
		let out = dir.path().join("out");

		let stats = export_store(&store, &out, &ExportOptions::default())?;
		assert_eq!(stats.exported, 2);
		assert_eq!(fs::read(out.join("tiles/1/1/0.png"))?, b"B");
		Ok(())
	}

	#[test]
	fn no_overwrite_skips_existing_files() -> Result<()> {
		let dir = TempDir::new()?;
		let store = scenario_store(&dir)?;
		let out = dir.path().join("out");

		fs::create_dir_all(out.join("tiles/0/0"))?;
		fs::write(out.join("tiles/0/0/0.png"), b"existing")?;

		let options = ExportOptions {
			no_overwrite: true,
			..ExportOptions::default()
		};
		let stats = export_store(&store, &out, &options)?;
		assert_eq!(stats.exported, 2);
		assert_eq!(stats.skipped, 1);
		assert_eq!(fs::read(out.join("tiles/0/0/0.png"))?, b"existing");
		Ok(())
	}

	#[test]
	fn pipeline_is_applied_before_writing() -> Result<()> {
		let dir = TempDir::new()?;
		let store = scenario_store(&dir)?;
		let out = dir.path().join("out");

		let options = ExportOptions {
			zoom: ZoomRange::single(0)?,
			pipeline: Some(TransformPipeline::new(vec!["printf ! >> {}".to_string()])),
			..ExportOptions::default()
		};
		export_store(&store, &out, &options)?;
		assert_eq!(fs::read(out.join("tiles/0/0/0.png"))?, b"A!");
		Ok(())
	}

	#[test]
	fn delete_source_removes_the_exported_range() -> Result<()> {
		let dir = TempDir::new()?;
		let store = scenario_store(&dir)?;
		let out = dir.path().join("out");

		let options = ExportOptions {
			zoom: ZoomRange::single(1)?,
			delete_source: true,
			skip_analyze: true,
			skip_vacuum: true,
			..ExportOptions::default()
		};
		export_store(&store, &out, &options)?;

		assert_eq!(store.count_tiles(&ZoomRange::single(1)?)?, 0);
		assert_eq!(store.count_tiles(&ZoomRange::single(0)?)?, 1);
		Ok(())
	}

	#[test]
	fn missing_format_defaults_to_png() -> Result<()> {
		let dir = TempDir::new()?;
		let store = testing::normalized_store(&dir.path().join("store.mbtiles"), None, &[(0, 0, 0, b"A")])?;
		let out = dir.path().join("out");

		export_store(&store, &out, &ExportOptions::default())?;
		assert!(out.join("tiles/0/0/0.png").exists());
		Ok(())
	}
}
