//! Checkout: quote, price, then open a payment intent carrying everything
//! fulfillment will need when the payment later succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clients::stripe::{CreatePaymentIntent, StripeClient};
use crate::errors::ServiceError;
use crate::models::pricing::{to_minor_units, PricingBreakdown};
use crate::models::recipient::{NormalizedRecipient, RecipientInput};
use crate::services::quotes::{summarize_quote, QuoteParams, QuoteService};

#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub photo_id: Uuid,
    pub variant_id: Uuid,
    pub color_code: Option<String>,
    pub copies: Option<i64>,
    pub recipient: RecipientInput,
    pub shipping_method: Option<String>,
    pub product_attributes: Option<Map<String, Value>>,
    pub asset_override_url: Option<String>,
    pub user_id: Option<Uuid>,
}

/// What the storefront needs to proceed with payment confirmation.
#[derive(Debug, Clone)]
pub struct CheckoutIntent {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    /// Integer minor units actually charged
    pub amount: i64,
    pub currency: String,
    pub pricing: PricingBreakdown,
}

#[derive(Clone)]
pub struct PaymentService {
    quotes: Arc<QuoteService>,
    stripe: Arc<StripeClient>,
}

impl PaymentService {
    pub fn new(quotes: Arc<QuoteService>, stripe: Arc<StripeClient>) -> Self {
        Self { quotes, stripe }
    }

    /// Quotes the order live and opens a payment intent for provider cost
    /// plus margin. The intent's metadata is the complete fulfillment input;
    /// nothing is re-derived from client data after payment.
    #[instrument(skip(self, params), fields(photo_id = %params.photo_id, variant_id = %params.variant_id))]
    pub async fn create_order_payment(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutIntent, ServiceError> {
        let recipient = params.recipient.normalize()?;

        let destination_country_code = Some(recipient.address.country_code.clone());
        let quote = self
            .quotes
            .compute_quote(QuoteParams {
                photo_id: params.photo_id,
                variant_id: params.variant_id,
                color_code: params.color_code.clone(),
                copies: params.copies,
                destination_country_code,
                shipping_method: params.shipping_method.clone(),
                product_attributes: params.product_attributes.clone(),
                asset_override_url: params.asset_override_url.clone(),
            })
            .await?;

        let pricing = summarize_quote(&quote.response, quote.resolved.variant.effective_margin());
        if pricing.provider_total <= Decimal::ZERO {
            return Err(ServiceError::upstream(
                "provider quote returned no cost for this variant",
                None,
                serde_json::to_value(&quote.response).ok(),
            ));
        }
        if pricing.total_with_margin <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "computed order total is not payable".into(),
            ));
        }

        let currency = quote
            .resolved
            .variant
            .currency
            .clone()
            .unwrap_or_else(|| pricing.currency.clone());
        let amount = to_minor_units(pricing.total_with_margin);

        let metadata = build_intent_metadata(&params, &quote.resolved.selected_color, &quote, &pricing, &recipient)?;

        let description = format!(
            "Print order: {} ({})",
            quote.resolved.photo.title, quote.resolved.product.name
        );

        let intent = self
            .stripe
            .create_payment_intent(&CreatePaymentIntent {
                amount,
                currency: currency.clone(),
                description,
                metadata,
                shipping: Some(recipient),
            })
            .await?;

        // Reconciliation key: the merchant reference IS the intent id, so a
        // webhook alone is enough to place and deduplicate the order.
        let mut reference_update = BTreeMap::new();
        reference_update.insert("merchantReference".to_string(), intent.id.clone());
        if let Err(e) = self
            .stripe
            .update_payment_intent_metadata(&intent.id, &reference_update)
            .await
        {
            // Fulfillment keys on the intent id itself, so the order still
            // places; only the metadata echo is lost.
            warn!(error = %e, payment_intent_id = %intent.id, "merchant reference metadata update failed");
        }

        info!(
            payment_intent_id = %intent.id,
            amount,
            currency = %currency,
            "payment intent created"
        );

        Ok(CheckoutIntent {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount,
            currency,
            pricing,
        })
    }
}

fn build_intent_metadata(
    params: &CheckoutParams,
    selected_color: &Option<crate::entities::photo_variant::ColorOption>,
    quote: &crate::services::quotes::QuoteContext,
    pricing: &PricingBreakdown,
    recipient: &NormalizedRecipient,
) -> Result<BTreeMap<String, String>, ServiceError> {
    let mut metadata = BTreeMap::new();
    metadata.insert("photoId".into(), params.photo_id.to_string());
    metadata.insert("variantId".into(), params.variant_id.to_string());
    if let Some(color) = selected_color {
        metadata.insert("colorCode".into(), color.code.clone());
    }
    metadata.insert("copies".into(), quote.copies.to_string());
    metadata.insert("shippingMethod".into(), quote.shipping_method.clone());
    if let Some(ref quote_id) = quote.response.id {
        metadata.insert("quoteId".into(), quote_id.clone());
    }
    if let Some(user_id) = params.user_id {
        metadata.insert("userId".into(), user_id.to_string());
    }

    metadata.insert("currency".into(), pricing.currency.clone());
    metadata.insert("items".into(), fixed(pricing.items));
    metadata.insert("shipping".into(), fixed(pricing.shipping));
    metadata.insert("tax".into(), fixed(pricing.tax));
    metadata.insert("fees".into(), fixed(pricing.fees));
    metadata.insert("providerTotal".into(), fixed(pricing.provider_total));
    metadata.insert("margin".into(), fixed(pricing.margin));
    metadata.insert("totalWithMargin".into(), fixed(pricing.total_with_margin));

    let recipient_json = serde_json::to_string(recipient)
        .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
    metadata.insert("recipient".into(), recipient_json);

    // Provisional; overwritten with the intent id right after creation
    metadata.insert("merchantReference".into(), Uuid::new_v4().to_string());

    Ok(metadata)
}

/// Two-decimal fixed-point rendering for metadata values.
fn fixed(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fixed_point_rendering() {
        assert_eq!(fixed(dec!(41)), "41.00");
        assert_eq!(fixed(dec!(12.345)), "12.34");
        assert_eq!(fixed(dec!(12.355)), "12.36");
    }
}
