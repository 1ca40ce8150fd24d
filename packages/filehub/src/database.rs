use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::logical_file;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("filehub::entity::*")
        .sync(&db)
        .await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

/// Secondary indexes on `logical_file` that the schema sync does not derive
/// from the entities.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    // Reference counting: SELECT COUNT(*) FROM logical_file WHERE physical_ref = ?
    let by_ref = Index::create()
        .if_not_exists()
        .name("idx_logical_file_physical_ref")
        .table(logical_file::Entity)
        .col(logical_file::Column::PhysicalRef)
        .to_owned();

    // Newest-first listing.
    let by_upload = Index::create()
        .if_not_exists()
        .name("idx_logical_file_uploaded_at")
        .table(logical_file::Entity)
        .col(logical_file::Column::UploadedAt)
        .to_owned();

    for (name, stmt) in [
        ("idx_logical_file_physical_ref", by_ref),
        ("idx_logical_file_uploaded_at", by_upload),
    ] {
        match db.execute_raw(backend.build(&stmt)).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}
