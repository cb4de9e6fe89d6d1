//! Maintenance engines for SQLite tile stores.
//!
//! A tile store is a SQLite database in one of two shapes: *flat* (one
//! self-contained row per tile in a `tiles` table) or *normalized*
//! (deduplicated content in `images`, coordinates in `map`, and a `tiles`
//! view reproducing the flat row shape for existing readers). Every engine
//! inspects the store at run time to find out which shape it is in.
//!
//! The engines:
//! - [`compact_store`] converts a flat store into the normalized form.
//! - [`merge_stores`] reconciles one store into another under an
//!   overwrite/axis/transform policy.
//! - [`export_store`] materializes tiles into a directory tree.
//! - [`rewrite_store`] pushes every distinct tile content through an
//!   external transform pipeline, in place.
//!
//! Transform pipelines are ordered shell command templates run against a
//! temp file per content unit; see [`TransformPipeline`]. Engines own their
//! commit boundaries and do not compose with each other within one call.

mod engines;
mod pool;
mod store;
mod stream;
mod transform;
mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use engines::{
	CompactOptions, CompactStats, ExportOptions, ExportStats, MergeOptions, MergeStats, RewriteOptions, RewriteStats,
	compact_store, export_store, merge_stores, rewrite_store,
};
pub use pool::TransformPool;
pub use store::{StoreShape, TilesetStore};
pub use stream::scan_in_chunks;
pub use transform::{TransformOutcome, TransformPipeline, TransformResult, TransformTask};
pub use validate::{QuickCheckValidator, StoreValidator};
