mod digest;
mod error;
mod hash;
mod staging;
mod traits;

pub mod filesystem;

pub use digest::{DIGEST_CHUNK_SIZE, Digest, StreamDigest, digest_reader};
pub use error::StorageError;
pub use hash::{ContentHash, SHARD_DEPTH};
pub use staging::StagedBlob;
pub use traits::{BlobStore, BoxReader};
