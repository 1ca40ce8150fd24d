use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "physical_object")]
pub struct Model {
    /// SHA-256 content hash, lowercase hex. The primary key doubles as the
    /// uniqueness constraint that get-or-create relies on.
    #[sea_orm(primary_key, auto_increment = false)]
    pub content_hash: String,

    /// Size of the blob in bytes.
    pub size_bytes: i64,

    /// MIME type recorded by the first upload of this content.
    pub content_type: String,

    /// Blob path relative to the storage root, derived from the hash.
    pub storage_location: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub logical_files: HasMany<super::logical_file::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
