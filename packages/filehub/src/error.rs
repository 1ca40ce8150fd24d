use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;

/// Errors surfaced by the file hub to its callers.
///
/// Reclamation problems during delete are deliberately absent: they are
/// logged and reported through [`crate::services::ReclaimStatus`], never as
/// a failure of the delete itself.
#[derive(Debug, Error)]
pub enum HubError {
    /// The upload stream could not be fully consumed.
    #[error("Failed to read upload: {0}")]
    Read(#[source] std::io::Error),

    #[error("Upload exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage statistics could not be read from a consistent snapshot.
    #[error("Failed to aggregate storage statistics: {0}")]
    Aggregation(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<StorageError> for HubError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Read(e) => HubError::Read(e),
            StorageError::SizeLimitExceeded { actual, limit } => {
                HubError::SizeLimitExceeded { actual, limit }
            }
            other => HubError::Storage(other),
        }
    }
}
