mod blob;
mod content_hash;
mod tile_coord;
mod zoom_range;

pub use blob::Blob;
pub use content_hash::ContentHash;
pub use tile_coord::TileCoord;
pub use zoom_range::ZoomRange;
