use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Query, SelectStatement};
use sea_orm::*;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::entity::{logical_file, physical_object};
use crate::error::HubError;

const SUM_SIZE: &str = r#"CAST(COALESCE(SUM("physical_object"."size_bytes"), 0) AS BIGINT)"#;

/// Storage totals read from one consistent snapshot.
///
/// Physical totals cover objects that at least one logical file references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub logical_file_count: u64,
    pub physical_file_count: u64,
    /// Each logical file counted at the size of its physical object.
    pub total_logical_size_bytes: u64,
    /// Each physical object counted once.
    pub total_physical_size_bytes: u64,
    /// Bytes not written thanks to deduplication.
    pub storage_savings_bytes: u64,
}

/// Compute [`StorageStats`].
///
/// Postgres reads inside a read-only repeatable-read transaction; SQLite
/// transactions are already serializable. Any failure is reported as
/// [`HubError::Aggregation`] and no partial result is returned.
pub async fn storage_stats(db: &DatabaseConnection) -> Result<StorageStats, HubError> {
    collect(db).await.map_err(|e| {
        error!(error = %e, "Failed to aggregate storage statistics");
        HubError::Aggregation(e.to_string())
    })
}

async fn collect(db: &DatabaseConnection) -> Result<StorageStats, AggregateError> {
    let txn = match db.get_database_backend() {
        DbBackend::Postgres => {
            db.begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await?
        }
        _ => db.begin().await?,
    };

    let logical_file_count = logical_file::Entity::find().count(&txn).await?;
    let physical_file_count = physical_object::Entity::find()
        .filter(physical_object::Column::ContentHash.in_subquery(referenced()))
        .count(&txn)
        .await?;

    let logical_bytes: Option<i64> = logical_file::Entity::find()
        .inner_join(physical_object::Entity)
        .select_only()
        .column_as(Expr::cust(SUM_SIZE), "total")
        .into_tuple()
        .one(&txn)
        .await?;

    let physical_bytes: Option<i64> = physical_object::Entity::find()
        .filter(physical_object::Column::ContentHash.in_subquery(referenced()))
        .select_only()
        .column_as(Expr::cust(SUM_SIZE), "total")
        .into_tuple()
        .one(&txn)
        .await?;

    txn.commit().await?;

    let total_logical_size_bytes = to_unsigned("logical size", logical_bytes.unwrap_or(0))?;
    let total_physical_size_bytes = to_unsigned("physical size", physical_bytes.unwrap_or(0))?;
    let storage_savings_bytes = total_logical_size_bytes
        .checked_sub(total_physical_size_bytes)
        .ok_or(AggregateError::Invariant(format!(
            "logical size {total_logical_size_bytes} is below physical size {total_physical_size_bytes}"
        )))?;

    Ok(StorageStats {
        logical_file_count,
        physical_file_count,
        total_logical_size_bytes,
        total_physical_size_bytes,
        storage_savings_bytes,
    })
}

/// Hashes with at least one logical file. Orphans left by a deferred
/// reclaim are garbage awaiting the sweep and do not count as stored.
fn referenced() -> SelectStatement {
    Query::select()
        .column(logical_file::Column::PhysicalRef)
        .from(logical_file::Entity)
        .to_owned()
}

fn to_unsigned(what: &str, v: i64) -> Result<u64, AggregateError> {
    u64::try_from(v).map_err(|_| AggregateError::Invariant(format!("negative {what}: {v}")))
}

#[derive(Debug, Error)]
enum AggregateError {
    #[error("{0}")]
    Database(#[from] DbErr),
    #[error("inconsistent totals: {0}")]
    Invariant(String),
}
