//! Chunked streaming over large tables.
//!
//! Scanning a whole `tiles` or `map` table in one go would hold every row
//! in memory at once. [`scan_in_chunks`] partitions the scan into
//! successive windows of the table's rowid — `rowid ∈ (lo, lo + chunk]` —
//! and materializes one window at a time. Ordering across chunks follows
//! rowid order; ordering within a chunk is whatever SQLite returns. There
//! is no persisted cursor: restarting means re-running the same scan.

use anyhow::{Result, ensure};
use r2d2_sqlite::rusqlite::{self, Connection, Row, ToSql};

/// Run `sql` over successive rowid windows, handing each non-empty chunk of
/// mapped rows to `each_chunk`.
///
/// `sql` must bind its rowid window as `?1` (exclusive lower bound) and `?2`
/// (inclusive upper bound); `extra_params` are bound after those, starting
/// at `?3`. Rows are mapped through `map_row` and collected per window, so
/// no statement is left in progress when `each_chunk` runs — callers may
/// open and commit transactions on the same connection between chunks.
///
/// # Errors
/// Returns an error if `chunk_size` is not positive, a query fails, or
/// `each_chunk` fails.
pub fn scan_in_chunks<T>(
	conn: &Connection,
	sql: &str,
	extra_params: &[&dyn ToSql],
	max_rowid: i64,
	chunk_size: i64,
	mut map_row: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
	mut each_chunk: impl FnMut(Vec<T>) -> Result<()>,
) -> Result<()> {
	ensure!(chunk_size > 0, "chunk size ({chunk_size}) must be positive");

	let mut stmt = conn.prepare(sql)?;
	let mut lower = 0i64;
	while lower < max_rowid {
		let upper = lower + chunk_size;
		let chunk = {
			let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(extra_params.len() + 2);
			bound.push(&lower);
			bound.push(&upper);
			bound.extend_from_slice(extra_params);
			stmt
				.query_map(bound.as_slice(), &mut map_row)?
				.collect::<rusqlite::Result<Vec<T>>>()?
		};
		lower = upper;

		if chunk.is_empty() {
			continue;
		}
		each_chunk(chunk)?;
	}
	Ok(())
}
