//! Opening, inspecting and maintaining tile stores.
//!
//! A [`TilesetStore`] wraps a pooled SQLite connection to one tile database.
//! It answers the questions every engine asks first — which shape is the
//! store in, what metadata does it declare, how many tiles are in range —
//! and provides the shared maintenance operations (range deletion,
//! ANALYZE/VACUUM). All engine writes go through a single coordinator
//! connection; the pool only serves the short-lived lookups around them.

pub(crate) mod schema;

use anyhow::{Context, Result, ensure};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use r2d2_sqlite::rusqlite::{OptionalExtension, params};
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use tilevault_core::ZoomRange;

/// The two schema shapes a tile store can be in.
///
/// The shape is a run-time property of the database, not of this type;
/// every operation inspects the store before deciding how to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreShape {
	/// One self-contained row per tile in a `tiles` table.
	Flat,
	/// Deduplicated `images` + `map` tables with a `tiles` view on top.
	Normalized,
}

/// A connection to one tile store on disk.
pub struct TilesetStore {
	path: PathBuf,
	pool: Pool<SqliteConnectionManager>,
}

impl TilesetStore {
	/// Open an existing tile store.
	///
	/// # Errors
	/// Returns an error if the file does not exist or SQLite cannot open it.
	pub fn open(path: &Path) -> Result<TilesetStore> {
		ensure!(path.exists(), "tile store {path:?} does not exist");
		TilesetStore::connect(path)
	}

	/// Create a new, empty tile store in normalized shape.
	///
	/// # Errors
	/// Returns an error if the file already exists or the schema cannot be created.
	pub fn create(path: &Path) -> Result<TilesetStore> {
		ensure!(!path.exists(), "refusing to overwrite existing {path:?}");
		log::info!("creating empty tile store {path:?}");

		let store = TilesetStore::connect(path)?;
		let conn = store.conn()?;
		schema::prepare_normalized(&conn)?;
		schema::finalize_normalized(&conn)?;
		Ok(store)
	}

	fn connect(path: &Path) -> Result<TilesetStore> {
		log::debug!("connecting to {path:?}");

		let manager = SqliteConnectionManager::file(path)
			.with_init(|conn| conn.pragma_update(None, "journal_mode", "WAL"));
		let pool = Pool::builder()
			.max_size(8)
			.build(manager)
			.with_context(|| format!("opening tile store {path:?}"))?;

		Ok(TilesetStore {
			path: path.to_path_buf(),
			pool,
		})
	}

	/// Check out a connection from the pool.
	pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
		self
			.pool
			.get()
			.with_context(|| format!("getting a connection to {:?}", self.path))
	}

	/// The filesystem path of this store.
	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Inspect the schema to find out which shape the store is in.
	pub fn shape(&self) -> Result<StoreShape> {
		let images: i64 = self.conn()?.query_row(
			"SELECT count(name) FROM sqlite_master WHERE type='table' AND name='images'",
			[],
			|row| row.get(0),
		)?;
		Ok(if images > 0 {
			StoreShape::Normalized
		} else {
			StoreShape::Flat
		})
	}

	/// Read a single metadata value. A missing entry or a store without a
	/// metadata table both yield `None`.
	pub fn metadata_value(&self, name: &str) -> Result<Option<String>> {
		let conn = self.conn()?;
		let mut stmt = match conn.prepare("SELECT value FROM metadata WHERE name = ?1") {
			Ok(stmt) => stmt,
			Err(_) => return Ok(None),
		};
		Ok(stmt.query_row(params![name], |row| row.get(0)).optional()?)
	}

	/// Insert or replace a metadata entry.
	pub fn set_metadata(&self, name: &str, value: &str) -> Result<()> {
		self.conn()?.execute(
			"INSERT OR REPLACE INTO metadata (name, value) VALUES (?1, ?2)",
			params![name, value],
		)?;
		Ok(())
	}

	/// Insert a metadata entry only if the name is not present yet.
	pub fn set_metadata_if_absent(&self, name: &str, value: &str) -> Result<()> {
		self.conn()?.execute(
			"INSERT OR IGNORE INTO metadata (name, value) VALUES (?1, ?2)",
			params![name, value],
		)?;
		Ok(())
	}

	/// Dump every metadata entry. Stores without a metadata table yield an
	/// empty list.
	pub fn metadata(&self) -> Result<Vec<(String, String)>> {
		let conn = self.conn()?;
		let mut stmt = match conn.prepare("SELECT name, value FROM metadata") {
			Ok(stmt) => stmt,
			Err(_) => return Ok(Vec::new()),
		};
		let entries = stmt
			.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
			.collect::<r2d2_sqlite::rusqlite::Result<Vec<_>>>()?;
		Ok(entries)
	}

	/// Count the tiles within `zoom`, independent of shape (the `tiles`
	/// name resolves to the flat table or the compatibility view).
	pub fn count_tiles(&self, zoom: &ZoomRange) -> Result<u64> {
		let count: i64 = self.conn()?.query_row(
			"SELECT count(*) FROM tiles WHERE zoom_level >= ?1 AND zoom_level <= ?2",
			params![zoom.min, zoom.max],
			|row| row.get(0),
		)?;
		Ok(count as u64)
	}

	/// The highest rowid of `table`, or 0 when the table is empty.
	pub fn max_rowid(&self, table: &str) -> Result<i64> {
		let max: Option<i64> = self
			.conn()?
			.query_row(&format!("SELECT max(rowid) FROM {table}"), [], |row| row.get(0))?;
		Ok(max.unwrap_or(0))
	}

	/// Delete every tile within `zoom`, committing in its own transaction.
	///
	/// On a normalized store this removes the `images` rows referenced from
	/// the range before removing the `map` rows. A hash that is also
	/// referenced by mappings outside the range loses its content row, so
	/// those mappings dangle afterwards; callers deleting partial ranges
	/// from stores that share content across zoom levels must account for
	/// this.
	pub fn delete_zoom_range(&self, zoom: &ZoomRange) -> Result<()> {
		log::debug!("deleting tiles {zoom} from {:?}", self.path);

		let shape = self.shape()?;
		let mut conn = self.conn()?;
		let tx = conn.transaction()?;
		match shape {
			StoreShape::Normalized => {
				tx.execute(
					"DELETE FROM images WHERE tile_id IN (SELECT tile_id FROM map WHERE zoom_level >= ?1 AND zoom_level <= ?2)",
					params![zoom.min, zoom.max],
				)?;
				tx.execute(
					"DELETE FROM map WHERE zoom_level >= ?1 AND zoom_level <= ?2",
					params![zoom.min, zoom.max],
				)?;
			}
			StoreShape::Flat => {
				tx.execute(
					"DELETE FROM tiles WHERE zoom_level >= ?1 AND zoom_level <= ?2",
					params![zoom.min, zoom.max],
				)?;
			}
		}
		tx.commit()?;
		Ok(())
	}

	/// Run storage maintenance after bulk deletes.
	pub fn optimize(&self, skip_analyze: bool, skip_vacuum: bool) -> Result<()> {
		let conn = self.conn()?;
		if !skip_analyze {
			log::info!("analyzing {:?}", self.path);
			conn.execute_batch("ANALYZE")?;
		}
		if !skip_vacuum {
			log::info!("vacuuming {:?}", self.path);
			conn.execute_batch("VACUUM")?;
		}
		Ok(())
	}
}

impl Debug for TilesetStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TilesetStore").field("path", &self.path).finish()
	}
}
