pub mod compact;
pub mod create;
pub mod export;
pub mod merge;
pub mod optimize;
pub mod rewrite;

use anyhow::Result;
use tilevault_core::ZoomRange;

/// Zoom filter arguments shared by several subcommands.
#[derive(clap::Args, Debug)]
pub struct ZoomArgs {
	/// use only tiles of this single zoom level
	#[arg(long, short, value_name = "int", display_order = 1, conflicts_with_all = ["min_zoom", "max_zoom"])]
	zoom: Option<u8>,

	/// minimum zoom level
	#[arg(long, value_name = "int", display_order = 1)]
	min_zoom: Option<u8>,

	/// maximum zoom level
	#[arg(long, value_name = "int", display_order = 1)]
	max_zoom: Option<u8>,
}

impl ZoomArgs {
	pub fn to_range(&self) -> Result<ZoomRange> {
		if let Some(zoom) = self.zoom {
			return ZoomRange::single(zoom);
		}
		let full = ZoomRange::full();
		ZoomRange::new(self.min_zoom.unwrap_or(full.min), self.max_zoom.unwrap_or(full.max))
	}
}
