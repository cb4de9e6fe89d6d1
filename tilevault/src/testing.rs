//! Fixture helpers shared by the engine tests.

use crate::store::TilesetStore;
use anyhow::Result;
use r2d2_sqlite::rusqlite::{self, Connection, params};
use std::path::Path;
use tilevault_core::ContentHash;

/// One fixture tile: `(zoom_level, tile_column, tile_row, tile_data)`.
pub type FixtureTile<'a> = (u8, u32, u32, &'a [u8]);

/// Create a flat store on disk with the given tiles (and optional `format`
/// metadata), the way third-party writers produce them.
pub fn flat_store(path: &Path, format: Option<&str>, tiles: &[FixtureTile]) -> Result<TilesetStore> {
	{
		let conn = Connection::open(path)?;
		conn.execute_batch(
			"CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
			CREATE TABLE metadata (name TEXT, value TEXT, UNIQUE (name));",
		)?;
		if let Some(format) = format {
			conn.execute("INSERT INTO metadata (name, value) VALUES ('format', ?1)", params![format])?;
		}
		for &(level, x, y, data) in tiles {
			conn.execute(
				"INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
				params![level, x, y, data],
			)?;
		}
	}
	TilesetStore::open(path)
}

/// Create a normalized store on disk with the given tiles already
/// deduplicated by content hash.
pub fn normalized_store(path: &Path, format: Option<&str>, tiles: &[FixtureTile]) -> Result<TilesetStore> {
	let store = TilesetStore::create(path)?;
	if let Some(format) = format {
		store.set_metadata("format", format)?;
	}
	let conn = store.conn()?;
	for &(level, x, y, data) in tiles {
		let id = ContentHash::of(data);
		conn.execute(
			"INSERT OR IGNORE INTO images (tile_id, tile_data) VALUES (?1, ?2)",
			params![id.as_str(), data],
		)?;
		conn.execute(
			"REPLACE INTO map (zoom_level, tile_column, tile_row, tile_id) VALUES (?1, ?2, ?3, ?4)",
			params![level, x, y, id.as_str()],
		)?;
	}
	drop(conn);
	Ok(store)
}

/// All rows of the `tiles` table or view, ordered by coordinate.
pub fn view_rows(store: &TilesetStore) -> Result<Vec<(u8, u32, u32, Vec<u8>)>> {
	let conn = store.conn()?;
	let mut stmt = conn.prepare(
		"SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles \
		ORDER BY zoom_level, tile_column, tile_row",
	)?;
	let rows = stmt
		.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
		.collect::<rusqlite::Result<Vec<_>>>()?;
	Ok(rows)
}

/// Row count of an arbitrary table.
pub fn table_count(store: &TilesetStore, table: &str) -> Result<i64> {
	let count = store
		.conn()?
		.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
	Ok(count)
}

/// The content hash a coordinate is mapped to.
pub fn mapped_hash(store: &TilesetStore, level: u8, x: u32, y: u32) -> Result<String> {
	let hash = store.conn()?.query_row(
		"SELECT tile_id FROM map WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
		params![level, x, y],
		|row| row.get(0),
	)?;
	Ok(hash)
}
