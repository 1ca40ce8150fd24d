use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::hash::ContentHash;
use super::staging::StagedBlob;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Content-addressed blob storage.
///
/// Writing is split in two steps so that the caller can decide, inside a
/// database transaction, whether the bytes become a new blob or are thrown
/// away as a duplicate: [`stage`](BlobStore::stage) spools and digests the
/// upload, [`persist`](BlobStore::persist) moves it into the blob tree.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Largest upload accepted, in bytes.
    fn max_size(&self) -> u64;

    /// Spool an upload into the staging area and compute its digest.
    ///
    /// `declared_size` is checked before any byte is read.
    async fn stage(
        &self,
        reader: BoxReader,
        declared_size: Option<u64>,
    ) -> Result<StagedBlob, StorageError>;

    /// Move a staged upload to its content-derived location.
    async fn persist(&self, staged: StagedBlob) -> Result<(), StorageError>;

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, hash: &ContentHash) -> Result<BoxReader, StorageError>;

    /// Delete a blob by its content hash.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Remove the now-empty shard directories of a deleted blob, innermost
    /// first, stopping at the storage root or the first non-empty directory.
    ///
    /// Never fails; problems are logged. Returns the number of directories
    /// removed.
    async fn prune_empty_dirs(&self, hash: &ContentHash) -> usize;

    /// Every blob currently in the tree, in no particular order. Entries
    /// whose path is not a valid content hash are skipped.
    async fn list_blobs(&self) -> Result<Vec<ContentHash>, StorageError>;

    /// Delete staging files older than `min_age`, left behind by crashed
    /// uploads. Returns the number of files removed.
    async fn sweep_staging(&self, min_age: Duration) -> Result<usize, StorageError>;
}
