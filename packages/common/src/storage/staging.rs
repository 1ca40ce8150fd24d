use std::path::{Path, PathBuf};

use super::digest::Digest;
use super::hash::ContentHash;

/// A temporary file in the staging area, deleted on drop unless kept.
#[derive(Debug)]
pub(crate) struct StagingFile {
    path: PathBuf,
    keep: bool,
}

impl StagingFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// The file has been moved into the blob tree; do not delete it.
    pub(crate) fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to discard staged upload");
            }
        }
    }
}

/// Upload bytes spooled to the staging area and digested, not yet part of
/// the blob tree.
///
/// Dropping a `StagedBlob` discards the bytes. This is how duplicate
/// uploads are thrown away and how an aborted upload leaves nothing behind.
#[derive(Debug)]
pub struct StagedBlob {
    pub(crate) file: StagingFile,
    digest: Digest,
}

impl StagedBlob {
    pub(crate) fn new(file: StagingFile, digest: Digest) -> Self {
        Self { file, digest }
    }

    pub fn hash(&self) -> ContentHash {
        self.digest.hash
    }

    pub fn size(&self) -> u64 {
        self.digest.size
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }
}
