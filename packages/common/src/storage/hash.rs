use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::StorageError;

/// Number of directory levels between the storage root and a blob file.
pub const SHARD_DEPTH: usize = 2;

/// A validated SHA-256 content hash, the deduplication key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the SHA-256 hash of an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Construct from raw SHA-256 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded content hash string.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != 64 {
            return Err(StorageError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }

        let bytes =
            hex::decode(s).map_err(|e| StorageError::InvalidHash(format!("invalid hex: {e}")))?;

        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidHash("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Return the hash as a 64-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Directory components between the storage root and the blob file,
    /// outermost first: `["ab", "cd"]` for a hash starting with `abcd`.
    pub fn shard_dirs(&self) -> [String; SHARD_DEPTH] {
        [hex::encode(&self.0[..1]), hex::encode(&self.0[1..2])]
    }

    /// File name of the blob inside its shard directory (the last 60 hex chars).
    pub fn shard_file(&self) -> String {
        hex::encode(&self.0[SHARD_DEPTH..])
    }

    /// Blob path relative to the storage root.
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for dir in self.shard_dirs() {
            path.push(dir);
        }
        path.push(self.shard_file());
        path
    }

    /// Storage location as a `/`-separated key, independent of the host OS.
    pub fn storage_location(&self) -> String {
        let [outer, inner] = self.shard_dirs();
        format!("{outer}/{inner}/{}", self.shard_file())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
