use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content digest of a stored file.
///
/// A `ContentDigest` is the 256-bit hash of a file's bytes. It has two
/// renderings: [`to_url_safe`](Self::to_url_safe) is the addressable key
/// under which the object is stored, and [`to_hex`](Self::to_hex) is used
/// only to derive the two shard directories above it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Length of the digest in bytes.
    pub const LEN: usize = 32;

    /// Create a digest from a pre-computed hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Unpadded base64url representation, used as the object key.
    pub fn to_url_safe(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// The two shard directory names: hex characters `[0..2]` and `[2..4]`.
    pub fn shard_segments(&self) -> [String; 2] {
        [hex::encode(&self.0[..1]), hex::encode(&self.0[1..2])]
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Parse from an unpadded base64url string.
    pub fn from_url_safe(s: &str) -> Result<Self, TypeError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| TypeError::InvalidBase64(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.short_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for ContentDigest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<ContentDigest> for [u8; 32] {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}
