use std::sync::Arc;
use std::time::Duration;

use common::config::StorageAppConfig;
use common::storage::filesystem::FilesystemBlobStore;
use common::storage::{BlobStore, BoxReader, ContentHash};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::init_db;
use crate::error::HubError;
use crate::models::{FileFilter, FileRecord, FileView};
use crate::services::{
    DeleteOutcome, DeletionCoordinator, FileRegistry, PhysicalObjects, StorageStats,
    SweepSummary, storage_stats,
};
use crate::utils::filename::validate_display_name;

/// Content type recorded when none is declared and the name gives no hint.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata accompanying an upload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub name: String,
    /// Size announced by the client, checked before any byte is read.
    pub declared_size: Option<u64>,
    pub content_type: Option<String>,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_size: None,
            content_type: None,
        }
    }

    pub fn declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Entry point for every file operation.
#[derive(Clone)]
pub struct FileHub {
    db: DatabaseConnection,
    blobs: Arc<dyn BlobStore>,
    storage: StorageAppConfig,
}

impl FileHub {
    pub fn new(
        db: DatabaseConnection,
        blobs: Arc<dyn BlobStore>,
        storage: StorageAppConfig,
    ) -> Self {
        Self { db, blobs, storage }
    }

    /// Connect to the database, sync the schema and open the blob tree.
    pub async fn open(config: &AppConfig) -> Result<Self, HubError> {
        let db = init_db(&config.database).await?;
        let blobs = FilesystemBlobStore::new(
            config.storage.root.clone(),
            config.storage.max_upload_size,
        )
        .await?;

        info!(
            root = %config.storage.root.display(),
            max_upload_size = config.storage.max_upload_size,
            "File hub ready"
        );

        Ok(Self::new(db, Arc::new(blobs), config.storage.clone()))
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Store an upload, deduplicating its content.
    ///
    /// The name is validated before the stream is touched. The stream is
    /// staged and hashed outside any transaction; the physical lookup and
    /// the logical insert then commit together.
    #[instrument(skip(self, reader), fields(name = %request.name))]
    pub async fn upload(
        &self,
        reader: BoxReader,
        request: UploadRequest,
    ) -> Result<FileView, HubError> {
        let name = validate_display_name(&request.name)
            .map_err(|e| HubError::InvalidName(e.message().into()))?
            .to_string();

        let staged = self.blobs.stage(reader, request.declared_size).await?;
        let hash = staged.hash();
        let content_type = resolve_content_type(request.content_type.as_deref(), &name);

        let txn = self.db.begin().await?;
        let objects = PhysicalObjects::new(&txn, self.blobs.as_ref());
        let (physical, created) = objects.get_or_create(staged, &content_type).await?;

        let record = match FileRegistry::new(&txn).create(&physical, &name).await {
            Ok(record) => record,
            Err(e) => {
                if created {
                    objects.discard_blob(&hash).await;
                }
                txn.rollback().await?;
                return Err(e.into());
            }
        };

        if let Err(e) = txn.commit().await {
            if created {
                self.discard_uncommitted_blob(&hash).await;
            }
            return Err(e.into());
        }

        info!(
            id = %record.id,
            content_hash = %hash,
            size = record.size,
            deduplicated = !created,
            "Stored upload"
        );

        Ok(self.view(record))
    }

    pub async fn list(&self, filter: &FileFilter) -> Result<Vec<FileView>, HubError> {
        let records = FileRegistry::new(&self.db).list(filter).await?;
        Ok(records.into_iter().map(|r| self.view(r)).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<FileView, HubError> {
        let record = FileRegistry::new(&self.db).get(id).await?;
        Ok(self.view(record))
    }

    /// Metadata and a reader over the content of a file.
    pub async fn open_content(&self, id: Uuid) -> Result<(FileView, BoxReader), HubError> {
        let record = FileRegistry::new(&self.db).get(id).await?;
        let hash = ContentHash::from_hex(&record.content_hash)?;
        let reader = self.blobs.get_stream(&hash).await?;
        Ok((self.view(record), reader))
    }

    pub async fn delete(&self, id: Uuid) -> Result<DeleteOutcome, HubError> {
        DeletionCoordinator::new(&self.db, self.blobs.as_ref())
            .delete(id)
            .await
    }

    pub async fn stats(&self) -> Result<StorageStats, HubError> {
        storage_stats(&self.db).await
    }

    pub async fn reclaim_orphans(
        &self,
        staging_min_age: Duration,
    ) -> Result<SweepSummary, HubError> {
        DeletionCoordinator::new(&self.db, self.blobs.as_ref())
            .reclaim_orphans(staging_min_age)
            .await
    }

    fn view(&self, record: FileRecord) -> FileView {
        FileView::from_record(record, &self.storage)
    }

    /// A commit failed after this upload persisted a new blob. The commit
    /// may still have gone through, so the blob is only removed when no
    /// committed row claims it.
    async fn discard_uncommitted_blob(&self, hash: &ContentHash) {
        let objects = PhysicalObjects::new(&self.db, self.blobs.as_ref());
        match objects.find(hash).await {
            Ok(Some(_)) => {}
            Ok(None) => objects.discard_blob(hash).await,
            Err(e) => {
                warn!(content_hash = %hash, error = %e, "Could not check blob after failed commit, keeping it");
            }
        }
    }
}

/// The declared type if any, else a guess from the name, else
/// [`DEFAULT_CONTENT_TYPE`].
pub fn resolve_content_type(declared: Option<&str>, name: &str) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|s| !s.is_empty()) {
        return declared.to_string();
    }

    mime_guess::from_path(name)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
