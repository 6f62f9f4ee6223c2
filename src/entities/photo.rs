use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A sellable image. The asset path is immutable once created; variants
/// reference photos but the fulfillment core never deletes them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "photos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    /// Informational display price, not used by the fulfillment core
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Json", nullable)]
    pub tags: Option<Json>,
    /// Relative path of the stored image, resolved against the public base URL
    pub image_path: String,
    #[sea_orm(nullable)]
    pub owner_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub camera: Option<String>,
    #[sea_orm(nullable)]
    pub location: Option<String>,
    #[sea_orm(nullable)]
    pub shot_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::photo_variant::Entity")]
    PhotoVariants,
}

impl Related<super::photo_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PhotoVariants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
