use std::collections::HashSet;
use std::time::Duration;

use common::storage::{BlobStore, ContentHash};
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::physical::PhysicalObjects;
use super::registry::FileRegistry;
use crate::entity::{logical_file, physical_object};
use crate::error::HubError;

/// What happened to the physical object behind a deleted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReclaimStatus {
    /// Other files still reference the object; nothing was reclaimed.
    Shared { remaining: u64 },
    /// The blob and row are gone.
    Reclaimed { directories_removed: usize },
    /// Reclamation failed and was rolled back. The object is now an orphan
    /// for [`DeletionCoordinator::reclaim_orphans`] to pick up.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: Uuid,
    pub content_hash: String,
    pub reclaim: ReclaimStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub objects_reclaimed: usize,
    /// Blobs in the tree without a physical object row.
    pub stray_blobs_removed: usize,
    pub staging_files_removed: usize,
    pub failures: usize,
}

/// Removes logical files and reclaims physical objects that lose their
/// last reference.
pub struct DeletionCoordinator<'a> {
    db: &'a DatabaseConnection,
    blobs: &'a dyn BlobStore,
}

impl<'a> DeletionCoordinator<'a> {
    pub fn new(db: &'a DatabaseConnection, blobs: &'a dyn BlobStore) -> Self {
        Self { db, blobs }
    }

    /// Delete a logical file.
    ///
    /// The logical row is removed in its own transaction together with the
    /// reference recount, under an exclusive lock on the physical row.
    /// Reclamation runs in a savepoint of that transaction, so its failure
    /// is logged and reported as [`ReclaimStatus::Deferred`] without undoing
    /// the delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<DeleteOutcome, HubError> {
        let logical = FileRegistry::new(self.db)
            .find(id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("File {id} not found")))?;
        let hash = ContentHash::from_hex(&logical.physical_ref)?;

        let txn = self.db.begin().await?;

        if PhysicalObjects::new(&txn, self.blobs)
            .lock(&hash)
            .await?
            .is_none()
        {
            warn!(content_hash = %hash, "Deleting file whose physical object is missing");
        }

        let registry = FileRegistry::new(&txn);
        registry.remove(id).await?;
        let remaining = registry.count_refs_for(&hash).await?;

        let reclaimed = if remaining > 0 {
            None
        } else {
            match reclaim_in_savepoint(&txn, self.blobs, &hash).await {
                Ok(_) => Some(true),
                Err(e) => {
                    warn!(
                        content_hash = %hash,
                        error = %e,
                        "Reclaim failed, leaving physical object for the orphan sweep"
                    );
                    Some(false)
                }
            }
        };

        txn.commit().await?;

        let reclaim = match reclaimed {
            None => ReclaimStatus::Shared { remaining },
            Some(false) => ReclaimStatus::Deferred,
            Some(true) => ReclaimStatus::Reclaimed {
                directories_removed: self.blobs.prune_empty_dirs(&hash).await,
            },
        };

        info!(content_hash = %hash, ?reclaim, "Deleted file");

        Ok(DeleteOutcome {
            id,
            content_hash: hash.to_hex(),
            reclaim,
        })
    }

    /// Reclaim physical objects no logical file references, remove blobs
    /// that have no physical object, then clear staging files older than
    /// `staging_min_age`.
    ///
    /// Orphan rows only exist after a failed reclamation. Each one is
    /// handled under the same lock and recount as [`delete`](Self::delete),
    /// so a concurrent upload that re-attached the content wins. Stray
    /// blobs are left by uploads cancelled between persisting the blob and
    /// committing the row.
    #[instrument(skip(self))]
    pub async fn reclaim_orphans(
        &self,
        staging_min_age: Duration,
    ) -> Result<SweepSummary, HubError> {
        let candidates: Vec<String> = physical_object::Entity::find()
            .select_only()
            .column(physical_object::Column::ContentHash)
            .filter(
                physical_object::Column::ContentHash.not_in_subquery(
                    Query::select()
                        .column(logical_file::Column::PhysicalRef)
                        .from(logical_file::Entity)
                        .to_owned(),
                ),
            )
            .into_tuple()
            .all(self.db)
            .await?;

        let mut summary = SweepSummary::default();

        for key in candidates {
            match self.reclaim_orphan(&key).await {
                Ok(true) => summary.objects_reclaimed += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failures += 1;
                    warn!(content_hash = %key, error = %e, "Failed to reclaim orphan");
                }
            }
        }

        if let Err(e) = self.reclaim_stray_blobs(&mut summary).await {
            summary.failures += 1;
            warn!(error = %e, "Failed to scan blob tree");
        }

        match self.blobs.sweep_staging(staging_min_age).await {
            Ok(removed) => summary.staging_files_removed = removed,
            Err(e) => {
                summary.failures += 1;
                warn!(error = %e, "Failed to sweep staging area");
            }
        }

        info!(
            objects_reclaimed = summary.objects_reclaimed,
            stray_blobs_removed = summary.stray_blobs_removed,
            staging_files_removed = summary.staging_files_removed,
            failures = summary.failures,
            "Orphan sweep finished"
        );

        Ok(summary)
    }

    /// Mark every blob that has a row, then sweep the rest.
    async fn reclaim_stray_blobs(&self, summary: &mut SweepSummary) -> Result<(), HubError> {
        let on_disk = self.blobs.list_blobs().await?;
        if on_disk.is_empty() {
            return Ok(());
        }

        let known: HashSet<String> = physical_object::Entity::find()
            .select_only()
            .column(physical_object::Column::ContentHash)
            .into_tuple::<String>()
            .all(self.db)
            .await?
            .into_iter()
            .collect();

        for hash in on_disk {
            if known.contains(&hash.to_hex()) {
                continue;
            }
            match self.reclaim_stray(&hash).await {
                Ok(true) => summary.stray_blobs_removed += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failures += 1;
                    warn!(content_hash = %hash, error = %e, "Failed to remove stray blob");
                }
            }
        }

        Ok(())
    }

    async fn reclaim_stray(&self, hash: &ContentHash) -> Result<bool, HubError> {
        let txn = self.db.begin().await?;

        if !PhysicalObjects::new(&txn, self.blobs)
            .claim_stray(hash)
            .await?
        {
            txn.rollback().await?;
            return Ok(false);
        }

        let removed = self.blobs.delete(hash).await?;
        txn.rollback().await?;

        if removed {
            debug!(content_hash = %hash, "Removed stray blob");
            self.blobs.prune_empty_dirs(hash).await;
        }
        Ok(removed)
    }

    async fn reclaim_orphan(&self, key: &str) -> Result<bool, HubError> {
        let hash = ContentHash::from_hex(key)?;
        let txn = self.db.begin().await?;
        let objects = PhysicalObjects::new(&txn, self.blobs);

        if objects.lock(&hash).await?.is_none() {
            txn.rollback().await?;
            return Ok(false);
        }

        if FileRegistry::new(&txn).count_refs_for(&hash).await? > 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        let removed = objects.reclaim(&hash).await?;
        txn.commit().await?;

        if removed {
            self.blobs.prune_empty_dirs(&hash).await;
        }
        Ok(removed)
    }
}

async fn reclaim_in_savepoint(
    txn: &DatabaseTransaction,
    blobs: &dyn BlobStore,
    hash: &ContentHash,
) -> Result<bool, HubError> {
    let savepoint = txn.begin().await?;

    match PhysicalObjects::new(&savepoint, blobs).reclaim(hash).await {
        Ok(removed) => {
            savepoint.commit().await?;
            Ok(removed)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}
