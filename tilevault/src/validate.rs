//! Pre-merge integrity checking.

use crate::store::{StoreShape, TilesetStore};
use anyhow::Result;
use r2d2_sqlite::rusqlite::params;
use tilevault_core::ZoomRange;

/// External integrity validator, invoked on the source store before a merge
/// when the caller requests it.
pub trait StoreValidator {
	/// Whether `store` looks sound within `zoom`.
	fn validate(&self, store: &TilesetStore, zoom: &ZoomRange) -> Result<bool>;
}

/// Delegates to SQLite's `quick_check` and verifies that every mapping in
/// range resolves to stored content.
pub struct QuickCheckValidator;

impl StoreValidator for QuickCheckValidator {
	fn validate(&self, store: &TilesetStore, zoom: &ZoomRange) -> Result<bool> {
		let conn = store.conn()?;

		let verdict: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
		if verdict != "ok" {
			log::warn!("quick_check on {:?} reported: {verdict}", store.path());
			return Ok(false);
		}

		if store.shape()? == StoreShape::Normalized {
			let orphans: i64 = conn.query_row(
				"SELECT count(*) FROM map LEFT JOIN images ON images.tile_id = map.tile_id \
				WHERE images.tile_id IS NULL AND map.zoom_level >= ?1 AND map.zoom_level <= ?2",
				params![zoom.min, zoom.max],
				|row| row.get(0),
			)?;
			if orphans > 0 {
				log::warn!("{orphans} mappings in {:?} reference missing content", store.path());
				return Ok(false);
			}
		}

		Ok(true)
	}
}
