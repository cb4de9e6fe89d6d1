//! DDL for the normalized store shape.
//!
//! The normalized schema splits content from coordinates:
//! - `images (tile_data, tile_id)` — one row per distinct content, keyed by
//!   content hash;
//! - `map (zoom_level, tile_column, tile_row, tile_id)` — one row per
//!   coordinate, pointing at its content;
//! - a `tiles` view joining the two, so readers of the flat shape keep
//!   working unmodified.
//!
//! Uniqueness is declared in the CREATE TABLE statements so that duplicate
//! content is detectable from the very first insert, not only once the
//! final indices exist.

use anyhow::Result;
use r2d2_sqlite::rusqlite::Connection;

/// Create the normalized relations if they are absent.
pub(crate) fn prepare_normalized(conn: &Connection) -> Result<()> {
	conn.execute_batch(
		"CREATE TABLE IF NOT EXISTS images (tile_data BLOB, tile_id TEXT, UNIQUE (tile_id));
		CREATE TABLE IF NOT EXISTS map (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_id TEXT, UNIQUE (zoom_level, tile_column, tile_row));
		CREATE TABLE IF NOT EXISTS metadata (name TEXT, value TEXT, UNIQUE (name));",
	)?;
	Ok(())
}

/// Drop the flat `tiles` table (when present), install the compatibility
/// view in its place and create the uniqueness indices.
pub(crate) fn finalize_normalized(conn: &Connection) -> Result<()> {
	let has_flat_table: i64 = conn.query_row(
		"SELECT count(name) FROM sqlite_master WHERE type='table' AND name='tiles'",
		[],
		|row| row.get(0),
	)?;
	if has_flat_table > 0 {
		conn.execute_batch("DROP TABLE tiles")?;
	}

	conn.execute_batch(
		"CREATE VIEW IF NOT EXISTS tiles AS
			SELECT map.zoom_level AS zoom_level,
				map.tile_column AS tile_column,
				map.tile_row AS tile_row,
				images.tile_data AS tile_data
			FROM map JOIN images ON images.tile_id = map.tile_id;
		CREATE UNIQUE INDEX IF NOT EXISTS map_index ON map (zoom_level, tile_column, tile_row);
		CREATE UNIQUE INDEX IF NOT EXISTS images_id ON images (tile_id);",
	)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use r2d2_sqlite::rusqlite::params;

	#[test]
	fn prepare_is_idempotent() -> Result<()> {
		let conn = Connection::open_in_memory()?;
		prepare_normalized(&conn)?;
		prepare_normalized(&conn)?;
		conn.execute(
			"INSERT INTO images (tile_id, tile_data) VALUES ('a', x'01')",
			[],
		)?;
		Ok(())
	}

	#[test]
	fn finalize_replaces_flat_table_with_view() -> Result<()> {
		let conn = Connection::open_in_memory()?;
		conn.execute_batch(
			"CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB)",
		)?;
		prepare_normalized(&conn)?;
		conn.execute(
			"INSERT INTO images (tile_id, tile_data) VALUES (?1, ?2)",
			params!["a", &b"data"[..]],
		)?;
		conn.execute(
			"INSERT INTO map (zoom_level, tile_column, tile_row, tile_id) VALUES (0, 0, 0, 'a')",
			[],
		)?;
		finalize_normalized(&conn)?;

		let kind: String = conn.query_row(
			"SELECT type FROM sqlite_master WHERE name='tiles'",
			[],
			|row| row.get(0),
		)?;
		assert_eq!(kind, "view");

		let data: Vec<u8> = conn.query_row("SELECT tile_data FROM tiles", [], |row| row.get(0))?;
		assert_eq!(data, b"data");
		Ok(())
	}

	#[test]
	fn finalize_without_flat_table() -> Result<()> {
		let conn = Connection::open_in_memory()?;
		prepare_normalized(&conn)?;
		finalize_normalized(&conn)?;
		finalize_normalized(&conn)?;
		Ok(())
	}

	#[test]
	fn duplicate_content_is_rejected_by_constraint() -> Result<()> {
		let conn = Connection::open_in_memory()?;
		prepare_normalized(&conn)?;
		conn.execute("INSERT INTO images (tile_id, tile_data) VALUES ('a', x'01')", [])?;
		let changed = conn.execute(
			"INSERT OR IGNORE INTO images (tile_id, tile_data) VALUES ('a', x'01')",
			[],
		)?;
		assert_eq!(changed, 0);
		Ok(())
	}
}
