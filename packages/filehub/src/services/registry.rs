use std::collections::HashMap;

use chrono::Utc;
use common::storage::ContentHash;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::warn;
use uuid::Uuid;

use crate::entity::{logical_file, physical_object};
use crate::error::HubError;
use crate::models::filter::escape_like;
use crate::models::{FileFilter, FileRecord};

/// Logical files: user-facing names pointing at physical objects.
pub struct FileRegistry<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> FileRegistry<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Record a new logical file for an existing physical object.
    ///
    /// Takes the resolved object rather than a bare hash so a record can
    /// never point at an object that was not looked up first.
    pub async fn create(
        &self,
        physical: &physical_object::Model,
        original_name: &str,
    ) -> Result<FileRecord, DbErr> {
        let row = logical_file::ActiveModel {
            id: Set(Uuid::now_v7()),
            original_name: Set(original_name.to_string()),
            search_name: Set(original_name.to_lowercase()),
            physical_ref: Set(physical.content_hash.clone()),
            uploaded_at: Set(Utc::now()),
        };
        let logical = row.insert(self.conn).await?;
        let refs = self.count_refs(&physical.content_hash).await?;

        Ok(FileRecord::new(logical, physical, refs))
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<logical_file::Model>, DbErr> {
        logical_file::Entity::find_by_id(id).one(self.conn).await
    }

    /// Fetch one logical file joined with its physical object.
    pub async fn get(&self, id: Uuid) -> Result<FileRecord, HubError> {
        let (logical, physical) = logical_file::Entity::find_by_id(id)
            .find_also_related(physical_object::Entity)
            .one(self.conn)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("File {id} not found")))?;

        let physical = physical.ok_or_else(|| {
            DbErr::RecordNotFound(format!(
                "physical object {} referenced by file {id} is missing",
                logical.physical_ref
            ))
        })?;
        let refs = self.count_refs(&physical.content_hash).await?;

        Ok(FileRecord::new(logical, &physical, refs))
    }

    /// Files matching every predicate of `filter`, newest upload first.
    pub async fn list(&self, filter: &FileFilter) -> Result<Vec<FileRecord>, HubError> {
        filter.validate()?;

        let mut select = logical_file::Entity::find().find_also_related(physical_object::Entity);

        if let Some(term) = filter.name_term() {
            let term = escape_like(&term.to_lowercase());
            select = select.filter(
                logical_file::Column::SearchName
                    .like(LikeExpr::new(format!("%{term}%")).escape('\\')),
            );
        }

        if let Some(ext) = filter.extension_suffix() {
            let ext = escape_like(&ext);
            select = select.filter(
                logical_file::Column::SearchName
                    .like(LikeExpr::new(format!("%.{ext}")).escape('\\')),
            );
        }

        if let Some(ref content_type) = filter.content_type_exact {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col((
                    physical_object::Entity,
                    physical_object::Column::ContentType,
                ))))
                .eq(content_type.trim().to_lowercase()),
            );
        }

        if let Some(min) = filter.min_size_bytes() {
            select = select.filter(physical_object::Column::SizeBytes.gte(min));
        }
        if let Some(max) = filter.max_size_bytes() {
            select = select.filter(physical_object::Column::SizeBytes.lte(max));
        }

        if let Some(from) = filter.uploaded_from() {
            select = select.filter(logical_file::Column::UploadedAt.gte(from));
        }
        if let Some(before) = filter.uploaded_before() {
            select = select.filter(logical_file::Column::UploadedAt.lt(before));
        }

        let rows = select
            .order_by_desc(logical_file::Column::UploadedAt)
            .order_by_desc(logical_file::Column::Id)
            .all(self.conn)
            .await?;

        let hashes: Vec<String> = rows
            .iter()
            .map(|(logical, _)| logical.physical_ref.clone())
            .collect();
        let counts = self.count_refs_many(hashes).await?;

        let mut records = Vec::with_capacity(rows.len());
        for (logical, physical) in rows {
            let Some(physical) = physical else {
                warn!(
                    id = %logical.id,
                    physical_ref = %logical.physical_ref,
                    "Skipping file whose physical object is missing"
                );
                continue;
            };
            let refs = counts.get(&physical.content_hash).copied().unwrap_or(0);
            records.push(FileRecord::new(logical, &physical, refs));
        }

        Ok(records)
    }

    /// Delete a logical file row. Never touches the physical object.
    pub async fn remove(&self, id: Uuid) -> Result<(), HubError> {
        let result = logical_file::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(HubError::NotFound(format!("File {id} not found")));
        }
        Ok(())
    }

    /// Number of logical files referencing a physical object.
    pub async fn count_refs(&self, content_hash: &str) -> Result<u64, DbErr> {
        logical_file::Entity::find()
            .filter(logical_file::Column::PhysicalRef.eq(content_hash))
            .count(self.conn)
            .await
    }

    pub async fn count_refs_for(&self, hash: &ContentHash) -> Result<u64, DbErr> {
        self.count_refs(&hash.to_hex()).await
    }

    async fn count_refs_many(&self, hashes: Vec<String>) -> Result<HashMap<String, u64>, DbErr> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, i64)> = logical_file::Entity::find()
            .select_only()
            .column(logical_file::Column::PhysicalRef)
            .column_as(logical_file::Column::Id.count(), "refs")
            .filter(logical_file::Column::PhysicalRef.is_in(hashes))
            .group_by(logical_file::Column::PhysicalRef)
            .into_tuple()
            .all(self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(hash, refs)| (hash, u64::try_from(refs).unwrap_or(0)))
            .collect())
    }
}
