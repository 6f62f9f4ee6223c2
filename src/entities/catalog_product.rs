use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A provider SKU template shared across photos. Deletion is blocked by the
/// back office while any variant references it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Globally unique, stored uppercased
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_price: Decimal,
    pub currency: String,
    #[sea_orm(nullable)]
    pub default_sizing: Option<String>,
    /// Preferred provider shipping method for this product, e.g. "Budget"
    #[sea_orm(nullable)]
    pub default_shipping_method: Option<String>,
    /// Available color options: list of { code, name }
    #[sea_orm(column_type = "Json", nullable)]
    pub color_options: Option<Json>,
    /// Cached provider metadata: dimensions, print-area pixel size,
    /// attribute map, shipping destinations
    #[sea_orm(column_type = "Json", nullable)]
    pub provider_details: Option<Json>,
    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
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

impl Model {
    /// Provider attribute map cached from a previous product-details fetch,
    /// if any.
    pub fn cached_attributes(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.provider_details
            .as_ref()
            .and_then(|d| d.get("attributes"))
            .and_then(|a| a.as_object().cloned())
            .filter(|m| !m.is_empty())
    }
}
