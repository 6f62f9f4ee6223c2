//! Live provider quoting plus the platform margin. The summarization step is
//! a pure function so pricing arithmetic is testable without a provider.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::clients::prodigi::{
    AssetEntry, ProdigiClient, QuoteItem, QuoteRequest, QuoteResponse,
};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::pricing::{PricingBreakdown, DEFAULT_CURRENCY};
use crate::services::assets::AssetResolver;
use crate::services::variants::{select_asset_candidate, ResolvedVariant, VariantResolver};

pub const MAX_COPIES: i32 = 10;

/// Inputs accepted by the quote engine. Everything except the photo/variant
/// pair is optional and defaulted.
#[derive(Debug, Clone, Default)]
pub struct QuoteParams {
    pub photo_id: Uuid,
    pub variant_id: Uuid,
    pub color_code: Option<String>,
    pub copies: Option<i64>,
    pub destination_country_code: Option<String>,
    pub shipping_method: Option<String>,
    pub product_attributes: Option<Map<String, Value>>,
    pub asset_override_url: Option<String>,
}

/// A provider quote together with everything that was resolved to obtain it.
/// Checkout reuses this context to build the payment without re-resolving.
#[derive(Debug, Clone)]
pub struct QuoteContext {
    pub response: QuoteResponse,
    pub resolved: ResolvedVariant,
    pub copies: i32,
    pub shipping_method: String,
    pub destination_country_code: String,
    /// Asset actually referenced on the quote item, when one was available
    pub asset_url: Option<String>,
}

#[derive(Clone)]
pub struct QuoteService {
    prodigi: Arc<ProdigiClient>,
    assets: AssetResolver,
    variants: VariantResolver,
    default_shipping_method: String,
    default_destination_country: String,
    public_base_url: String,
}

impl QuoteService {
    pub fn new(
        prodigi: Arc<ProdigiClient>,
        assets: AssetResolver,
        variants: VariantResolver,
        config: &AppConfig,
    ) -> Self {
        Self {
            prodigi,
            assets,
            variants,
            default_shipping_method: config.default_shipping_method.clone(),
            default_destination_country: config.default_destination_country.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Obtains a live provider quote for one variant. Quoting proceeds with a
    /// bare print-area reference when no asset can be resolved; only ordering
    /// requires one.
    #[instrument(skip(self, params), fields(photo_id = %params.photo_id, variant_id = %params.variant_id))]
    pub async fn compute_quote(&self, params: QuoteParams) -> Result<QuoteContext, ServiceError> {
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

        let copies = clamp_copies(params.copies);

        let candidate =
            select_asset_candidate(params.asset_override_url.as_deref(), &resolved, &self.public_base_url);
        let asset = self.assets.resolve(candidate.as_deref()).await;

        let attributes = self.quote_attributes(&params, &resolved, &sku).await;

        let shipping_method = params
            .shipping_method
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| resolved.product.default_shipping_method.clone())
            .unwrap_or_else(|| self.default_shipping_method.clone());

        let destination_country_code = params
            .destination_country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.default_destination_country.clone());

        let assets = match &asset {
            Some(reference) => vec![reference.to_entry("default")],
            // Quoting accepts a print area without image data
            None => vec![AssetEntry {
                print_area: "default".into(),
                id: None,
                url: None,
            }],
        };

        let request = QuoteRequest {
            shipping_method: shipping_method.clone(),
            destination_country_code: destination_country_code.clone(),
            items: vec![QuoteItem {
                sku,
                copies,
                attributes,
                assets,
            }],
        };

        let response = self.prodigi.create_quote(&request).await?;

        let asset_url = candidate;
        Ok(QuoteContext {
            response,
            resolved,
            copies,
            shipping_method,
            destination_country_code,
            asset_url,
        })
    }

    /// Attribute fallback chain: caller-supplied, then the variant cache,
    /// then the catalog cache, then a live product-details fetch. An empty
    /// cache must not fail the quote, so the live fetch degrades to an empty
    /// map on error.
    async fn quote_attributes(
        &self,
        params: &QuoteParams,
        resolved: &ResolvedVariant,
        sku: &str,
    ) -> Map<String, Value> {
        if let Some(attrs) = params
            .product_attributes
            .clone()
            .filter(|m| !m.is_empty())
        {
            return attrs;
        }
        if let Some(attrs) = resolved.variant.cached_attributes() {
            return attrs;
        }
        if let Some(attrs) = resolved.product.cached_attributes() {
            return attrs;
        }
        match self.prodigi.get_product(sku).await {
            Ok(details) => details.first_variant_attributes().unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, sku, "product attribute fetch failed, quoting without attributes");
                Map::new()
            }
        }
    }
}

/// Copies are clamped to [1, MAX_COPIES]; absent or nonsensical values
/// become a single copy.
pub fn clamp_copies(requested: Option<i64>) -> i32 {
    match requested {
        Some(n) if n > MAX_COPIES as i64 => MAX_COPIES,
        Some(n) if n >= 1 => n as i32,
        _ => 1,
    }
}

/// Collapses a provider quote into the canonical pricing breakdown and adds
/// the flat platform margin on top.
pub fn summarize_quote(response: &QuoteResponse, margin: Decimal) -> PricingBreakdown {
    let first = response.quotes.first();
    let costs = first.and_then(|q| q.cost_summary.clone()).unwrap_or_default();

    let items = costs.items.as_ref().map(|m| m.decimal()).unwrap_or_default();
    let shipping = costs
        .shipping
        .as_ref()
        .map(|m| m.decimal())
        .unwrap_or_default();
    let branding = costs
        .branding
        .as_ref()
        .map(|m| m.decimal())
        .unwrap_or_default();
    let tax = costs.tax.as_ref().map(|m| m.decimal()).unwrap_or_default();
    let raw_fees = costs.fees.as_ref().map(|m| m.decimal()).unwrap_or_default();
    // Branding cost is folded into fees so the components always sum to the
    // provider total
    let fees = raw_fees + branding;

    let summed = items + shipping + tax + fees;
    let provider_total = match costs.total_cost.as_ref() {
        Some(total) if total.amount.is_some() => {
            let t = total.decimal();
            if t > Decimal::ZERO {
                t
            } else {
                summed
            }
        }
        _ => summed,
    };

    let currency = costs
        .total_cost
        .as_ref()
        .and_then(|m| m.currency.clone())
        .or_else(|| costs.items.as_ref().and_then(|m| m.currency.clone()))
        .or_else(|| costs.shipping.as_ref().and_then(|m| m.currency.clone()))
        .or_else(|| first.and_then(|q| q.currency.clone()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let margin = margin.max(Decimal::ZERO);

    PricingBreakdown {
        currency,
        items,
        shipping,
        tax,
        fees,
        provider_total,
        margin,
        total_with_margin: provider_total + margin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn quote_response(body: Value) -> QuoteResponse {
        serde_json::from_value(body).unwrap()
    }

    #[rstest]
    #[case(None, 1)]
    #[case(Some(0), 1)]
    #[case(Some(-4), 1)]
    #[case(Some(3), 3)]
    #[case(Some(7), 7)]
    #[case(Some(10), 10)]
    #[case(Some(15), 10)]
    #[case(Some(250), 10)]
    fn copies_clamp_to_range(#[case] requested: Option<i64>, #[case] expected: i32) {
        assert_eq!(clamp_copies(requested), expected);
    }

    #[test]
    fn summarize_prefers_provider_total() {
        let response = quote_response(serde_json::json!({
            "outcome": "Created",
            "quotes": [{
                "costSummary": {
                    "items": { "amount": "30.00", "currency": "EUR" },
                    "shipping": { "amount": "6.00", "currency": "EUR" },
                    "totalCost": { "amount": "36.00", "currency": "EUR" }
                }
            }]
        }));
        let pricing = summarize_quote(&response, dec!(5));
        assert_eq!(pricing.items, dec!(30));
        assert_eq!(pricing.shipping, dec!(6));
        assert_eq!(pricing.provider_total, dec!(36));
        assert_eq!(pricing.margin, dec!(5));
        assert_eq!(pricing.total_with_margin, dec!(41));
        assert_eq!(pricing.currency, "EUR");
    }

    #[test]
    fn summarize_sums_components_when_total_missing() {
        let response = quote_response(serde_json::json!({
            "quotes": [{
                "currency": "GBP",
                "costSummary": {
                    "items": { "amount": "12.50" },
                    "shipping": { "amount": "4.95" },
                    "tax": { "amount": "3.66" },
                    "fees": { "amount": "0.20" },
                    "branding": { "amount": "1.00" }
                }
            }]
        }));
        let pricing = summarize_quote(&response, dec!(0));
        assert_eq!(pricing.fees, dec!(1.20));
        assert_eq!(pricing.provider_total, dec!(22.31));
        assert_eq!(pricing.total_with_margin, dec!(22.31));
        assert_eq!(pricing.currency, "GBP");
    }

    #[test]
    fn summarize_treats_unparseable_amounts_as_zero() {
        let response = quote_response(serde_json::json!({
            "quotes": [{
                "costSummary": {
                    "items": { "amount": "garbage", "currency": "EUR" },
                    "shipping": { "amount": "6.00", "currency": "EUR" }
                }
            }]
        }));
        let pricing = summarize_quote(&response, dec!(2));
        assert_eq!(pricing.items, Decimal::ZERO);
        assert_eq!(pricing.provider_total, dec!(6));
        assert_eq!(pricing.total_with_margin, dec!(8));
    }

    #[test]
    fn summarize_clamps_negative_margin() {
        let response = quote_response(serde_json::json!({
            "quotes": [{
                "costSummary": {
                    "totalCost": { "amount": "20.00", "currency": "EUR" }
                }
            }]
        }));
        let pricing = summarize_quote(&response, dec!(-3));
        assert_eq!(pricing.margin, Decimal::ZERO);
        assert_eq!(pricing.total_with_margin, dec!(20));
    }

    #[test]
    fn summarize_empty_quote_is_all_zero() {
        let pricing = summarize_quote(&QuoteResponse::default(), dec!(5));
        assert_eq!(pricing.provider_total, Decimal::ZERO);
        assert_eq!(pricing.total_with_margin, dec!(5));
        assert_eq!(pricing.currency, DEFAULT_CURRENCY);
    }
}
