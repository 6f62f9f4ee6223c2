use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The sellable combination of one photo with one catalog product, carrying
/// the platform margin and per-color asset overrides.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "photo_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub photo_id: Uuid,
    pub catalog_product_id: Uuid,
    #[sea_orm(nullable)]
    pub name: Option<String>,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    /// Informational retail price; the charged amount always comes from a
    /// live provider quote plus margin
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub retail_price: Option<Decimal>,
    #[sea_orm(nullable)]
    pub currency: Option<String>,
    /// Flat monetary amount added on top of provider cost, never a percentage
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub profit_margin: Decimal,
    #[sea_orm(nullable)]
    pub sizing: Option<String>,
    /// Default asset sent to the provider when the selected color has no
    /// override
    #[sea_orm(nullable)]
    pub asset_url: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub asset_details: Option<Json>,
    /// Merchandising previews: list of { id, url, label }
    #[sea_orm(column_type = "Json", nullable)]
    pub mockups: Option<Json>,
    /// List of ColorOption values
    #[sea_orm(column_type = "Json", nullable)]
    pub color_options: Option<Json>,
    /// Provider attribute map cached on the variant
    #[sea_orm(column_type = "Json", nullable)]
    pub provider_attributes: Option<Json>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::photo::Entity",
        from = "Column::PhotoId",
        to = "super::photo::Column::Id"
    )]
    Photo,
    #[sea_orm(
        belongs_to = "super::catalog_product::Entity",
        from = "Column::CatalogProductId",
        to = "super::catalog_product::Column::Id"
    )]
    CatalogProduct,
    #[sea_orm(has_many = "super::print_order::Entity")]
    PrintOrders,
}

impl Related<super::photo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Photo.def()
    }
}

impl Related<super::catalog_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogProduct.def()
    }
}

impl Related<super::print_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PrintOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// One purchasable color/finish of a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOption {
    /// Stored uppercase identifier, e.g. "BLU"
    pub code: String,
    pub name: String,
    /// Per-color asset override; falls back to the variant default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_details: Option<serde_json::Value>,
    /// References into the variant's mockup list
    #[serde(default)]
    pub mockup_ids: Vec<String>,
}

/// Merchandising preview image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockupImage {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Model {
    pub fn color_options(&self) -> Vec<ColorOption> {
        self.color_options
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn mockups(&self) -> Vec<MockupImage> {
        self.mockups
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn cached_attributes(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.provider_attributes
            .as_ref()
            .and_then(|a| a.as_object().cloned())
            .filter(|m| !m.is_empty())
    }

    /// Margin clamped to zero; a negative margin must never reduce the
    /// customer-facing price below provider cost.
    pub fn effective_margin(&self) -> Decimal {
        if self.profit_margin.is_sign_negative() {
            Decimal::ZERO
        } else {
            self.profit_margin
        }
    }
}
