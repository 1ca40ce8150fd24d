use chrono::{DateTime, Utc};
use common::config::StorageAppConfig;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{logical_file, physical_object};

/// A logical file joined with its physical object, with the derived
/// properties computed at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Uuid,
    pub original_name: String,
    pub content_hash: String,
    pub storage_location: String,
    pub size: i64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    /// Number of logical files sharing the physical object, this one included.
    pub reference_count: u64,
}

impl FileRecord {
    pub fn new(
        logical: logical_file::Model,
        physical: &physical_object::Model,
        reference_count: u64,
    ) -> Self {
        Self {
            id: logical.id,
            original_name: logical.original_name,
            content_hash: logical.physical_ref,
            storage_location: physical.storage_location.clone(),
            size: physical.size_bytes,
            content_type: physical.content_type.clone(),
            uploaded_at: logical.uploaded_at,
            reference_count,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.reference_count > 1
    }
}

/// What callers outside the core see for a file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileView {
    pub id: Uuid,
    pub original_name: String,
    /// Size in bytes.
    pub size: i64,
    pub content_type: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    /// SHA-256 of the content, lowercase hex.
    pub content_hash: String,
    pub is_duplicate: bool,
}

impl FileView {
    pub fn from_record(record: FileRecord, storage: &StorageAppConfig) -> Self {
        let is_duplicate = record.is_duplicate();
        Self {
            url: storage.public_url(&record.storage_location),
            id: record.id,
            original_name: record.original_name,
            size: record.size,
            content_type: record.content_type,
            uploaded_at: record.uploaded_at,
            content_hash: record.content_hash,
            is_duplicate,
        }
    }
}
