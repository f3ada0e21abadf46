//! Content hashing and streaming checksums for change detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content hash computed using XXH3.
///
/// Two sources with the same `ContentHash` are assumed to have identical
/// bytes. Source records carry one so that a cached translation unit is only
/// reused for the exact content it was compiled from.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Streaming 64-bit checksum over a sequence of tagged fields.
///
/// Every field is length-prefixed before it is fed to XXH3, so the
/// concatenation of `"ab", "c"` never collides with `"a", "bc"`.
pub struct Checksum {
    state: Xxh3,
}

impl Checksum {
    /// Creates a checksum seeded with a domain tag.
    pub fn new(domain: &str) -> Self {
        let mut checksum = Self { state: Xxh3::new() };
        checksum.write_str(domain);
        checksum
    }

    /// Feeds a length-prefixed byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.state.update(&(bytes.len() as u64).to_le_bytes());
        self.state.update(bytes);
        self
    }

    /// Feeds a length-prefixed string.
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_bytes(s.as_bytes())
    }

    /// Feeds a 64-bit integer.
    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.state.update(&value.to_le_bytes());
        self
    }

    /// Returns the checksum of everything written so far.
    pub fn finish(&self) -> u64 {
        self.state.digest()
    }
}
