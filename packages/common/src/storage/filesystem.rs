use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::digest::{DIGEST_CHUNK_SIZE, StreamDigest};
use super::error::StorageError;
use super::hash::{ContentHash, SHARD_DEPTH};
use super::staging::{StagedBlob, StagingFile};
use super::traits::{BlobStore, BoxReader};

/// Name of the staging directory inside the storage root.
pub const STAGING_DIR: &str = ".tmp";

/// How many times a rename into the blob tree is attempted when the shard
/// directory disappears underneath it.
const PERSIST_ATTEMPTS: u32 = 3;

/// Filesystem-backed content-addressed blob store.
///
/// Blobs are stored in a two-level sharded directory layout:
/// `{base_path}/{hex[0..2]}/{hex[2..4]}/{hex[4..]}`
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating the root and staging
    /// directories if needed.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(STAGING_DIR)).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Compute the filesystem path for a given content hash.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.base_path.join(hash.relative_path())
    }

    fn staging_dir(&self) -> PathBuf {
        self.base_path.join(STAGING_DIR)
    }

    fn temp_path(&self) -> PathBuf {
        self.staging_dir().join(uuid::Uuid::new_v4().to_string())
    }

    fn size_limit_error(&self, actual: u64) -> StorageError {
        StorageError::SizeLimitExceeded {
            actual,
            limit: self.max_size,
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    fn max_size(&self) -> u64 {
        self.max_size
    }

    async fn stage(
        &self,
        mut reader: BoxReader,
        declared_size: Option<u64>,
    ) -> Result<StagedBlob, StorageError> {
        if let Some(declared) = declared_size
            && declared > self.max_size
        {
            return Err(self.size_limit_error(declared));
        }

        let staging = StagingFile::new(self.temp_path());
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging.path())
            .await?;

        let mut digest = StreamDigest::new();
        let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buf).await.map_err(StorageError::Read)?;
            if n == 0 {
                break;
            }

            let total_bytes = digest.size() + n as u64;
            if total_bytes > self.max_size {
                return Err(self.size_limit_error(total_bytes));
            }

            digest.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }

        file.flush().await?;
        drop(file);
        let digest = digest.finish();

        debug!(
            content_hash = %digest.hash,
            size = digest.size,
            "Staged upload"
        );

        Ok(StagedBlob::new(staging, digest))
    }

    async fn persist(&self, staged: StagedBlob) -> Result<(), StorageError> {
        let hash = staged.hash();
        let blob_path = self.blob_path(&hash);
        let mut attempt = 0;

        loop {
            attempt += 1;

            if let Some(parent) = blob_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            match fs::rename(staged.file.path(), &blob_path).await {
                Ok(()) => {
                    staged.file.keep();
                    return Ok(());
                }
                // A concurrent directory cleanup removed the shard directory
                // between create_dir_all and rename.
                Err(e) if e.kind() == ErrorKind::NotFound && attempt < PERSIST_ATTEMPTS => {
                    debug!(content_hash = %hash, attempt, "Shard directory vanished, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn get_stream(&self, hash: &ContentHash) -> Result<BoxReader, StorageError> {
        let blob_path = self.blob_path(hash);
        match fs::File::open(&blob_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(hash.to_hex())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn prune_empty_dirs(&self, hash: &ContentHash) -> usize {
        let blob_path = self.blob_path(hash);
        let mut removed = 0;
        let mut current = blob_path.parent().map(Path::to_path_buf);

        for _ in 0..SHARD_DEPTH {
            let Some(dir) = current else {
                break;
            };
            if dir == self.base_path || !dir.starts_with(&self.base_path) {
                break;
            }

            match fs::remove_dir(&dir).await {
                Ok(()) => {
                    debug!(path = %dir.display(), "Removed empty blob directory");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(e) => {
                    warn!(
                        content_hash = %hash,
                        path = %dir.display(),
                        error = %e,
                        "Failed to remove blob directory"
                    );
                    break;
                }
            }

            current = dir.parent().map(Path::to_path_buf);
        }

        removed
    }

    async fn list_blobs(&self) -> Result<Vec<ContentHash>, StorageError> {
        // (directory, hex prefix spelled by the path so far)
        let mut level = vec![(self.base_path.clone(), String::new())];

        for _ in 0..SHARD_DEPTH {
            let mut next = Vec::new();
            for (dir, prefix) in level {
                for (path, name) in child_entries(&dir, true).await? {
                    if name.len() == 2 && is_lower_hex(&name) {
                        next.push((path, format!("{prefix}{name}")));
                    }
                }
            }
            level = next;
        }

        let mut hashes = Vec::new();
        for (dir, prefix) in level {
            for (path, name) in child_entries(&dir, false).await? {
                let hex = format!("{prefix}{name}");
                match ContentHash::from_hex(&hex) {
                    Ok(hash) if is_lower_hex(&name) => hashes.push(hash),
                    _ => debug!(path = %path.display(), "Skipping stray file in blob tree"),
                }
            }
        }

        Ok(hashes)
    }

    async fn sweep_staging(&self, min_age: Duration) -> Result<usize, StorageError> {
        let now = SystemTime::now();
        let mut entries = fs::read_dir(self.staging_dir()).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < min_age {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to remove stale staging file");
                }
            }
        }

        if removed > 0 {
            info!(removed, "Removed stale staging files");
        }

        Ok(removed)
    }
}

/// Names of the subdirectories (`dirs`) or regular files of `dir`.
/// Entries that vanish while listing are skipped.
async fn child_entries(dir: &Path, dirs: bool) -> Result<Vec<(PathBuf, String)>, StorageError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let wanted = if dirs {
            file_type.is_dir()
        } else {
            file_type.is_file()
        };
        if !wanted {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            children.push((entry.path(), name.to_string()));
        }
    }

    Ok(children)
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
