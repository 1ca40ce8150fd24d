use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "logical_file")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User-supplied display name. Not unique.
    pub original_name: String,

    /// `original_name` lowercased with full Unicode case folding, matched
    /// by name and extension filters. SQL `lower()` only folds ASCII on
    /// SQLite.
    pub search_name: String,

    pub physical_ref: String,
    #[sea_orm(belongs_to, from = "physical_ref", to = "content_hash")]
    pub physical_object: HasOne<super::physical_object::Entity>,

    pub uploaded_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
