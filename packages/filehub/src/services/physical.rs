use chrono::Utc;
use common::storage::{BlobStore, ContentHash, StagedBlob};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, DbErr, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::{debug, warn};

use crate::entity::physical_object;
use crate::error::HubError;

/// How many times an insert that lost a race against a concurrent reclaim
/// is retried before giving up.
pub const CONFLICT_RETRIES: usize = 3;

/// Physical objects and their blobs. The only writer of the
/// `physical_object` table and the blob tree besides the deletion
/// coordinator, which goes through [`PhysicalObjects::reclaim`].
pub struct PhysicalObjects<'a, C: ConnectionTrait> {
    conn: &'a C,
    blobs: &'a dyn BlobStore,
}

impl<'a, C: ConnectionTrait> PhysicalObjects<'a, C> {
    pub fn new(conn: &'a C, blobs: &'a dyn BlobStore) -> Self {
        Self { conn, blobs }
    }

    /// Return the object for the staged content, creating it if needed.
    ///
    /// `created` is `true` when this call inserted the row and persisted the
    /// blob. Otherwise the staged bytes are discarded and the existing row is
    /// returned unchanged. Must run inside a transaction so that a failure
    /// after the insert rolls the row back.
    pub async fn get_or_create(
        &self,
        staged: StagedBlob,
        content_type: &str,
    ) -> Result<(physical_object::Model, bool), HubError> {
        let hash = staged.hash();
        let key = hash.to_hex();
        let size = i64::try_from(staged.size()).map_err(|_| HubError::SizeLimitExceeded {
            actual: staged.size(),
            limit: self.blobs.max_size(),
        })?;

        for attempt in 1..=CONFLICT_RETRIES {
            let row = physical_object::ActiveModel {
                content_hash: Set(key.clone()),
                size_bytes: Set(size),
                content_type: Set(content_type.to_string()),
                storage_location: Set(hash.storage_location()),
                created_at: Set(Utc::now()),
            };

            let inserted = physical_object::Entity::insert(row)
                .on_conflict(
                    OnConflict::column(physical_object::Column::ContentHash)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(self.conn)
                .await?;

            if inserted > 0 {
                self.blobs.persist(staged).await?;
                let object = match self.find(&hash).await {
                    Ok(Some(object)) => object,
                    Ok(None) => {
                        self.discard_blob(&hash).await;
                        return Err(DbErr::RecordNotFound(format!(
                            "physical object {key} missing after insert"
                        ))
                        .into());
                    }
                    Err(e) => {
                        self.discard_blob(&hash).await;
                        return Err(e.into());
                    }
                };
                debug!(content_hash = %key, size, "Created physical object");
                return Ok((object, true));
            }

            // Lost the insert race. The shared lock waits out a concurrent
            // delete that holds the row for update.
            let existing = physical_object::Entity::find_by_id(key.clone())
                .lock(LockType::Share)
                .one(self.conn)
                .await?;

            if let Some(object) = existing {
                debug!(content_hash = %key, "Reusing existing physical object");
                return Ok((object, false));
            }

            warn!(
                content_hash = %key,
                attempt,
                "Physical object vanished after insert conflict, retrying"
            );
        }

        Err(DbErr::Custom(format!(
            "Failed to get or create physical object {key} after {CONFLICT_RETRIES} attempts"
        ))
        .into())
    }

    pub async fn find(
        &self,
        hash: &ContentHash,
    ) -> Result<Option<physical_object::Model>, DbErr> {
        physical_object::Entity::find_by_id(hash.to_hex())
            .one(self.conn)
            .await
    }

    /// Lock a physical object row for update until the transaction ends.
    ///
    /// Must be the first statement of its transaction. SQLite has no row
    /// locks and refuses to upgrade a read transaction once another
    /// connection has written, so there a no-op update takes the database
    /// write lock before anything is read.
    pub async fn lock(
        &self,
        hash: &ContentHash,
    ) -> Result<Option<physical_object::Model>, DbErr> {
        if self.conn.get_database_backend() == DbBackend::Sqlite {
            physical_object::Entity::update_many()
                .col_expr(
                    physical_object::Column::SizeBytes,
                    Expr::col(physical_object::Column::SizeBytes),
                )
                .filter(physical_object::Column::ContentHash.eq(hash.to_hex()))
                .exec(self.conn)
                .await?;
        }

        physical_object::Entity::find_by_id(hash.to_hex())
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    /// Insert a placeholder row for a blob that has none.
    ///
    /// The insert waits out a concurrent upload still holding an
    /// uncommitted row for the same content. Returns `false` if a row
    /// exists afterwards. On `true` the placeholder only serves as a lock:
    /// the caller removes the blob and rolls the transaction back.
    pub async fn claim_stray(&self, hash: &ContentHash) -> Result<bool, DbErr> {
        let placeholder = physical_object::ActiveModel {
            content_hash: Set(hash.to_hex()),
            size_bytes: Set(0),
            content_type: Set(String::new()),
            storage_location: Set(hash.storage_location()),
            created_at: Set(Utc::now()),
        };

        let inserted = physical_object::Entity::insert(placeholder)
            .on_conflict(
                OnConflict::column(physical_object::Column::ContentHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await?;

        Ok(inserted > 0)
    }

    /// Delete the blob, then the row. Returns whether a row was removed.
    ///
    /// A blob that is already gone is logged and does not stop the row
    /// deletion. Callers must hold the row lock and have checked that no
    /// logical file references the object.
    pub async fn reclaim(&self, hash: &ContentHash) -> Result<bool, HubError> {
        match self.blobs.delete(hash).await {
            Ok(true) => {}
            Ok(false) => warn!(content_hash = %hash, "Blob already absent during reclaim"),
            Err(e) => return Err(e.into()),
        }

        let result = physical_object::Entity::delete_by_id(hash.to_hex())
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Remove a blob persisted by a transaction that is about to roll back.
    ///
    /// Must be called while the transaction still holds the uncommitted
    /// insert, which keeps concurrent creators of the same content waiting.
    pub async fn discard_blob(&self, hash: &ContentHash) {
        match self.blobs.delete(hash).await {
            Ok(_) => {
                self.blobs.prune_empty_dirs(hash).await;
            }
            Err(e) => {
                warn!(content_hash = %hash, error = %e, "Failed to discard uncommitted blob");
            }
        }
    }
}
