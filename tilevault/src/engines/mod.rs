mod compact;
mod export;
mod merge;
mod rewrite;

pub use compact::{CompactOptions, CompactStats, compact_store};
pub use export::{ExportOptions, ExportStats, export_store};
pub use merge::{MergeOptions, MergeStats, merge_stores};
pub use rewrite::{RewriteOptions, RewriteStats, rewrite_store};
