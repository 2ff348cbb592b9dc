//! Content digests for synthesized ids and snapshot fingerprints.
//!
//! Uses BLAKE3 for all hashing operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLAKE3 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The number of bytes in a digest
    pub const LEN: usize = 32;

    /// Number of bytes rendered by [`Digest::short_hex`]
    pub const SHORT_LEN: usize = 12;

    /// Compute BLAKE3 digest of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex of the leading bytes, enough to keep synthesized ids unique per season
    #[must_use]
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..Self::SHORT_LEN])
    }

    /// Check if digest matches data
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Incremental digest over a sequence of canonically encoded values
///
/// Each value is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// never collide.
pub struct DigestWriter {
    hasher: blake3::Hasher,
    count: u64,
}

impl DigestWriter {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
            count: 0,
        }
    }

    /// Append one encoded value
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
        self.count += 1;
    }

    /// Number of values written
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Finish and return the digest
    #[must_use]
    pub fn finalize(self) -> Digest {
        Digest(*self.hasher.finalize().as_bytes())
    }
}

impl Default for DigestWriter {
    fn default() -> Self {
        Self::new()
    }
}
