use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable reconciliation record for one placed provider order, joining the
/// provider response, the pricing breakdown, and the originating payment.
/// Created exactly once when a payment is confirmed; never mutated by the
/// fulfillment core. Administrative actions mutate the provider's order,
/// not this snapshot.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "print_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Provider-facing idempotency key; equals the payment intent id for
    /// orders placed through checkout
    #[sea_orm(unique)]
    pub merchant_reference: String,
    pub provider_order_id: String,
    #[sea_orm(nullable)]
    pub outcome: Option<String>,
    #[sea_orm(nullable)]
    pub provider_status: Option<String>,
    pub photo_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    #[sea_orm(nullable)]
    pub color_code: Option<String>,
    pub copies: i32,
    pub shipping_method: String,
    /// Normalized recipient as sent to the provider
    #[sea_orm(column_type = "Json")]
    pub recipient: Json,
    #[sea_orm(column_type = "Json", nullable)]
    pub metadata: Option<Json>,
    /// Full snapshot of the provider's returned order object
    #[sea_orm(column_type = "Json", nullable)]
    pub provider_response: Option<Json>,
    /// Nullable: orders can be placed by unauthenticated checkout
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    /// Pricing breakdown: currency, provider components, margin, total charged
    #[sea_orm(column_type = "Json")]
    pub pricing: Json,
    #[sea_orm(unique, nullable)]
    pub payment_intent_id: Option<String>,
    #[sea_orm(nullable)]
    pub payment_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::photo_variant::Entity",
        from = "Column::VariantId",
        to = "super::photo_variant::Column::Id"
    )]
    PhotoVariant,
    #[sea_orm(
        belongs_to = "super::photo::Entity",
        from = "Column::PhotoId",
        to = "super::photo::Column::Id"
    )]
    Photo,
}

impl Related<super::photo_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PhotoVariant.def()
    }
}

impl Related<super::photo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Photo.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
