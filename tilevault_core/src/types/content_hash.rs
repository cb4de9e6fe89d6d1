//! Content addressing for tile bytes.
//!
//! A [`ContentHash`] is the deterministic digest of a tile's exact bytes and
//! the unit of deduplication everywhere: byte-identical tiles share one hash,
//! and hashes are assumed collision-free for that purpose. The digest is hex
//! MD5, which is what tile stores in the wild carry in their `tile_id`
//! columns; nothing here depends on cryptographic strength.

use std::fmt::{self, Debug, Display};

/// The hex digest identifying one distinct tile content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
	/// Compute the digest of `bytes`. Pure and deterministic.
	#[must_use]
	pub fn of(bytes: &[u8]) -> ContentHash {
		ContentHash(format!("{:x}", md5::compute(bytes)))
	}

	/// The digest as a hex string.
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Wraps a digest read back from storage.
impl From<String> for ContentHash {
	fn from(digest: String) -> Self {
		ContentHash(digest)
	}
}

impl Display for ContentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Debug for ContentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ContentHash({})", self.0)
	}
}
