use sha2::{Digest as _, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use super::error::StorageError;
use super::hash::ContentHash;

/// Read buffer size used when hashing a stream.
pub const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// Content identifier and byte count of a fully consumed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digest {
    pub hash: ContentHash,
    pub size: u64,
}

/// Running SHA-256 over bytes fed in order, for callers that already
/// loop over a stream for another reason.
#[derive(Clone, Default)]
pub struct StreamDigest {
    hasher: Sha256,
    size: u64,
}

impl StreamDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.size += chunk.len() as u64;
        self.hasher.update(chunk);
    }

    /// Bytes fed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finish(self) -> Digest {
        Digest {
            hash: ContentHash::from_bytes(self.hasher.finalize().into()),
            size: self.size,
        }
    }
}

/// Hash a seekable stream chunk by chunk and rewind it to the start.
///
/// Read failures surface as [`StorageError::Read`]; in that case the
/// stream position is unspecified and no digest is produced.
pub async fn digest_reader<R>(reader: &mut R) -> Result<Digest, StorageError>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let mut digest = StreamDigest::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await.map_err(StorageError::Read)?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }

    reader.rewind().await.map_err(StorageError::Read)?;

    Ok(digest.finish())
}
