use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_CURRENCY: &str = "EUR";

/// Canonical pricing structure computed from a provider quote. All amounts
/// are in major units of `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    pub currency: String,
    pub items: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub fees: Decimal,
    /// The provider's own cost for the order before platform margin
    pub provider_total: Decimal,
    /// Flat platform margin added on top, never negative
    pub margin: Decimal,
    pub total_with_margin: Decimal,
}

/// Pricing as persisted on the order record, with the amount actually
/// charged to the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPricing {
    pub currency: String,
    pub items: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub fees: Decimal,
    pub provider_total: Decimal,
    pub margin: Decimal,
    pub total_charged: Decimal,
}

impl From<PricingBreakdown> for OrderPricing {
    fn from(p: PricingBreakdown) -> Self {
        Self {
            currency: p.currency,
            items: p.items,
            shipping: p.shipping,
            tax: p.tax,
            fees: p.fees,
            provider_total: p.provider_total,
            margin: p.margin,
            total_charged: p.total_with_margin,
        }
    }
}

impl OrderPricing {
    /// Fallback pricing for orders placed without a recorded quote, e.g. a
    /// direct fulfillment invocation.
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            items: Decimal::ZERO,
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            fees: Decimal::ZERO,
            provider_total: Decimal::ZERO,
            margin: Decimal::ZERO,
            total_charged: Decimal::ZERO,
        }
    }
}

/// Converts a major-unit amount into the payment processor's minor-unit
/// integer: round half away from zero to two decimals, times 100, with a
/// floor of one unit.
pub fn to_minor_units(amount: Decimal) -> i64 {
    let cents = (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    cents.to_i64().unwrap_or(0).max(1)
}
