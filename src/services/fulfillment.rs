//! Places provider orders exactly once per payment and writes the durable
//! reconciliation record. The payment intent id doubles as the merchant
//! reference, so redelivered webhooks and retries collapse onto one order.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::clients::prodigi::{OrderItem, OrderRequest, ProdigiClient};
use crate::config::AppConfig;
use crate::entities::photo_variant::ColorOption;
use crate::entities::print_order;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::pricing::{OrderPricing, DEFAULT_CURRENCY};
use crate::models::recipient::RecipientInput;
use crate::services::assets::AssetResolver;
use crate::services::quotes::clamp_copies;
use crate::services::variants::{select_asset_candidate, ResolvedVariant, VariantResolver};

#[derive(Debug, Clone)]
pub struct PlaceOrderParams {
    pub photo_id: Uuid,
    pub variant_id: Uuid,
    pub color_code: Option<String>,
    pub copies: Option<i64>,
    pub recipient: RecipientInput,
    pub shipping_method: Option<String>,
    pub product_attributes: Option<Map<String, Value>>,
    pub merchant_reference: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_status: Option<String>,
    pub pricing: Option<OrderPricing>,
    pub created_by: Option<Uuid>,
}

/// Outcome of a placement attempt. `record` is absent only when the provider
/// accepted the order but the local write failed; the raw provider response
/// is always available.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub provider_response: Value,
    pub record: Option<print_order::Model>,
    pub already_placed: bool,
}

#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DatabaseConnection>,
    prodigi: Arc<ProdigiClient>,
    assets: AssetResolver,
    variants: VariantResolver,
    events: EventSender,
    default_shipping_method: String,
    public_base_url: String,
}

impl FulfillmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        prodigi: Arc<ProdigiClient>,
        assets: AssetResolver,
        variants: VariantResolver,
        events: EventSender,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            prodigi,
            assets,
            variants,
            events,
            default_shipping_method: config.default_shipping_method.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Places one provider order. Idempotent on the payment intent id: a
    /// record already holding it short-circuits to the stored snapshot, and
    /// a concurrent double placement is collapsed by the unique index.
    #[instrument(skip(self, params), fields(photo_id = %params.photo_id, variant_id = %params.variant_id))]
    pub async fn place_order(&self, params: PlaceOrderParams) -> Result<PlacedOrder, ServiceError> {
        if let Some(ref intent_id) = params.payment_intent_id {
            if let Some(existing) = self.find_by_payment_intent(intent_id).await? {
                info!(
                    payment_intent_id = %intent_id,
                    provider_order_id = %existing.provider_order_id,
                    "order already placed for payment, returning stored snapshot"
                );
                return Ok(PlacedOrder {
                    provider_response: existing.provider_response.clone().unwrap_or(Value::Null),
                    record: Some(existing),
                    already_placed: true,
                });
            }
        }

        let resolved = self
            .variants
            .resolve(params.photo_id, params.variant_id, params.color_code.as_deref())
            .await?;

        let sku = resolved.product.sku.trim().to_string();
        if sku.is_empty() {
            return Err(ServiceError::ConfigurationError(format!(
                "catalog product {} has no provider SKU",
                resolved.product.id
            )));
        }

        // Ordering, unlike quoting, requires real image data
        let candidate = select_asset_candidate(None, &resolved, &self.public_base_url);
        let asset = self
            .assets
            .resolve(candidate.as_deref())
            .await
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "variant {} has no fulfillable asset",
                    resolved.variant.id
                ))
            })?;

        let recipient = params.recipient.normalize()?;
        let copies = clamp_copies(params.copies);

        let merchant_reference = params
            .merchant_reference
            .clone()
            .or_else(|| params.payment_intent_id.clone())
            .unwrap_or_else(|| format!("{}-{:08x}", params.photo_id, rand::random::<u32>()));

        let shipping_method = params
            .shipping_method
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_shipping_method.clone());

        let attributes = merge_item_attributes(
            params.product_attributes.as_ref(),
            resolved.variant.cached_attributes().as_ref(),
            resolved.selected_color.as_ref(),
        );

        let sizing = resolved
            .variant
            .sizing
            .clone()
            .or_else(|| resolved.product.default_sizing.clone())
            .unwrap_or_else(|| "fillPrintArea".to_string());

        let color_code = resolved.selected_color.as_ref().map(|c| c.code.clone());

        let request = OrderRequest {
            merchant_reference: merchant_reference.clone(),
            shipping_method: shipping_method.clone(),
            recipient: recipient.clone(),
            items: vec![OrderItem {
                merchant_reference: format!("{}-item-1", merchant_reference),
                sku: sku.clone(),
                copies,
                sizing,
                attributes,
                assets: vec![asset.to_entry("default")],
                metadata: Some(serde_json::json!({
                    "variantId": params.variant_id,
                    "colorCode": color_code,
                })),
            }],
            metadata: Some(serde_json::json!({
                "source": "printfolio",
                "photoId": params.photo_id,
                "variantId": params.variant_id,
                "colorCode": color_code,
            })),
        };

        let created = self.prodigi.create_order(&request).await?;

        let provider_order_id = match created.order_id.clone() {
            Some(id) => id,
            None => {
                warn!(
                    merchant_reference = %merchant_reference,
                    "provider response carried no order id, recording merchant reference instead"
                );
                merchant_reference.clone()
            }
        };

        info!(
            merchant_reference = %merchant_reference,
            provider_order_id = %provider_order_id,
            outcome = created.outcome.as_deref().unwrap_or("unknown"),
            "provider order placed"
        );

        let pricing = params.pricing.clone().unwrap_or_else(|| {
            OrderPricing::zero(
                resolved
                    .variant
                    .currency
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            )
        });

        let record = print_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            merchant_reference: Set(merchant_reference.clone()),
            provider_order_id: Set(provider_order_id),
            outcome: Set(created.outcome.clone()),
            provider_status: Set(created.status_stage.clone()),
            photo_id: Set(params.photo_id),
            variant_id: Set(params.variant_id),
            sku: Set(sku),
            color_code: Set(color_code),
            copies: Set(copies),
            shipping_method: Set(shipping_method),
            recipient: Set(serde_json::to_value(&recipient)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?),
            metadata: Set(request.metadata.clone()),
            provider_response: Set(Some(created.raw.clone())),
            created_by: Set(params.created_by),
            pricing: Set(serde_json::to_value(&pricing)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?),
            payment_intent_id: Set(params.payment_intent_id.clone()),
            payment_status: Set(params.payment_status.clone()),
            created_at: Set(Utc::now()),
        };

        match record.insert(self.db.as_ref()).await {
            Ok(model) => {
                self.events
                    .send_detached(Event::OrderPlaced {
                        merchant_reference,
                        provider_order_id: model.provider_order_id.clone(),
                        variant_id: model.variant_id,
                    });
                Ok(PlacedOrder {
                    provider_response: created.raw,
                    record: Some(model),
                    already_placed: false,
                })
            }
            Err(db_err) => {
                // A concurrent placement for the same payment won the race;
                // the provider deduplicated on the merchant reference, so the
                // stored row is the authoritative outcome.
                if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    if let Some(ref intent_id) = params.payment_intent_id {
                        if let Some(existing) = self.find_by_payment_intent(intent_id).await? {
                            return Ok(PlacedOrder {
                                provider_response: existing
                                    .provider_response
                                    .clone()
                                    .unwrap_or(Value::Null),
                                record: Some(existing),
                                already_placed: true,
                            });
                        }
                    }
                }
                // Provider order exists but could not be recorded locally.
                // Surfacing an error here would trigger a retry and a second
                // physical order, so log loudly and hand back the response.
                error!(
                    error = %db_err,
                    merchant_reference = %merchant_reference,
                    "provider order placed but local record write failed"
                );
                self.events.send_detached(Event::OrderRecordPending {
                    merchant_reference: merchant_reference.clone(),
                    payment_intent_id: params.payment_intent_id.clone(),
                    occurred_at: Utc::now(),
                });
                Ok(PlacedOrder {
                    provider_response: created.raw,
                    record: None,
                    already_placed: false,
                })
            }
        }
    }

    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<print_order::Model>, ServiceError> {
        print_order::Entity::find()
            .filter(print_order::Column::PaymentIntentId.eq(payment_intent_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::from)
    }
}

/// Item attribute merge, lowest priority first: caller-supplied values, the
/// variant's cached attributes, then the selected color. The color always
/// lands lowercased under the `color` key.
pub fn merge_item_attributes(
    caller: Option<&Map<String, Value>>,
    cached: Option<&Map<String, Value>>,
    color: Option<&ColorOption>,
) -> Map<String, Value> {
    let mut merged = caller.cloned().unwrap_or_default();
    if let Some(cached) = cached {
        for (key, value) in cached {
            merged.insert(key.clone(), value.clone());
        }
    }
    if let Some(color) = color {
        merged.insert(
            "color".to_string(),
            Value::String(color.code.to_lowercase()),
        );
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn color(code: &str) -> ColorOption {
        ColorOption {
            code: code.to_string(),
            name: code.to_string(),
            asset_url: None,
            asset_details: None,
            mockup_ids: Vec::new(),
        }
    }

    #[test]
    fn cached_attributes_override_caller_values() {
        let caller = map(&[("wrap", "ImageWrap"), ("frame", "black")]);
        let cached = map(&[("wrap", "MirrorWrap")]);
        let merged = merge_item_attributes(Some(&caller), Some(&cached), None);
        assert_eq!(merged["wrap"], "MirrorWrap");
        assert_eq!(merged["frame"], "black");
    }

    #[test]
    fn selected_color_always_wins_and_is_lowercased() {
        let caller = map(&[("color", "green")]);
        let cached = map(&[("color", "red")]);
        let merged = merge_item_attributes(Some(&caller), Some(&cached), Some(&color("BLU")));
        assert_eq!(merged["color"], "blu");
    }

    #[test]
    fn no_inputs_yields_empty_map() {
        assert!(merge_item_attributes(None, None, None).is_empty());
    }
}
