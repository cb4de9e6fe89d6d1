//! Periodic progress reporting for long-running store operations.
//!
//! Each operation owns its own [`Progress`] value; there is no shared or
//! global reporting state. Output goes through the `log` crate so the
//! embedding binary decides how and where progress lines appear.

use log::{debug, info};
use std::time::Instant;

/// Counts processed rows and emits throughput lines at a fixed interval.
pub struct Progress {
	label: String,
	total: u64,
	count: u64,
	start: Instant,
	interval: u64,
}

impl Progress {
	/// Start a new counter. `total` may be zero when the row count is unknown.
	pub fn new(label: &str, total: u64) -> Progress {
		Progress {
			label: label.to_string(),
			total,
			count: 0,
			start: Instant::now(),
			interval: 100,
		}
	}

	/// Change how many rows pass between periodic reports.
	#[must_use]
	pub fn with_interval(mut self, interval: u64) -> Progress {
		self.interval = interval.max(1);
		self
	}

	/// Count one processed row. Returns `true` whenever a periodic report is due.
	pub fn inc(&mut self) -> bool {
		self.count += 1;
		self.count % self.interval == 0
	}

	/// Rows counted so far.
	#[must_use]
	pub fn count(&self) -> u64 {
		self.count
	}

	fn percent(&self) -> f64 {
		if self.total == 0 {
			100.0
		} else {
			self.count as f64 * 100.0 / self.total as f64
		}
	}

	fn per_sec(&self) -> f64 {
		let secs = self.start.elapsed().as_secs_f64();
		if secs > 0.0 { self.count as f64 / secs } else { 0.0 }
	}

	/// Emit a periodic report; `extra` is appended verbatim.
	pub fn log(&self, extra: &str) {
		debug!(
			"{}: {}/{} tiles ({:.1}%, {:.1} tiles/sec){}",
			self.label,
			self.count,
			self.total,
			self.percent(),
			self.per_sec(),
			extra
		);
	}

	/// Emit the final summary line.
	pub fn finish(&self, extra: &str) {
		info!(
			"{}: {} tiles ({:.1} tiles/sec){}",
			self.label,
			self.count,
			self.per_sec(),
			extra
		);
	}
}
