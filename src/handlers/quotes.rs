use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::models::pricing::PricingBreakdown;
use crate::services::quotes::{summarize_quote, QuoteParams};
use crate::AppState;

/// Copies arrive from storefront JS and may be a number, a numeric string,
/// or garbage. Anything unusable is treated as absent and later defaulted
/// to one copy.
pub fn lenient_copies<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteHttpRequest {
    pub photo_id: Uuid,
    pub variant_id: Uuid,
    #[serde(default)]
    pub color_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_copies")]
    #[schema(value_type = Option<i64>)]
    pub copies: Option<i64>,
    #[serde(default)]
    pub destination_country_code: Option<String>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub product_attributes: Option<Map<String, Value>>,
    /// Optional asset override, e.g. a cropped rendition
    #[serde(default)]
    pub asset_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteHttpResponse {
    pub pricing: PricingBreakdown,
    pub copies: i32,
    pub shipping_method: String,
    pub destination_country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

/// POST /api/v1/quote
#[utoipa::path(
    post,
    path = "/api/v1/quote",
    request_body = QuoteHttpRequest,
    responses(
        (status = 200, description = "Live quote with margin applied", body = QuoteHttpResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Photo or variant not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider rejected the quote", body = crate::errors::ErrorResponse)
    ),
    tag = "Quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<QuoteHttpRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .quotes
        .compute_quote(QuoteParams {
            photo_id: request.photo_id,
            variant_id: request.variant_id,
            color_code: request.color_code,
            copies: request.copies,
            destination_country_code: request.destination_country_code,
            shipping_method: request.shipping_method,
            product_attributes: request.product_attributes,
            asset_override_url: request.asset_url,
        })
        .await?;

    let pricing = summarize_quote(&quote.response, quote.resolved.variant.effective_margin());

    Ok(success_response(QuoteHttpResponse {
        pricing,
        copies: quote.copies,
        shipping_method: quote.shipping_method,
        destination_country_code: quote.destination_country_code,
        color_code: quote.resolved.selected_color.map(|c| c.code),
        quote_id: quote.response.id.clone(),
        outcome: quote.response.outcome.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_accepts_numbers_and_numeric_strings() {
        let req: QuoteHttpRequest = serde_json::from_value(serde_json::json!({
            "photoId": Uuid::new_v4(),
            "variantId": Uuid::new_v4(),
            "copies": 3
        }))
        .unwrap();
        assert_eq!(req.copies, Some(3));

        let req: QuoteHttpRequest = serde_json::from_value(serde_json::json!({
            "photoId": Uuid::new_v4(),
            "variantId": Uuid::new_v4(),
            "copies": " 5 "
        }))
        .unwrap();
        assert_eq!(req.copies, Some(5));
    }

    #[test]
    fn copies_tolerates_garbage() {
        for junk in [
            serde_json::json!("lots"),
            serde_json::json!({"n": 2}),
            serde_json::json!([2]),
            serde_json::json!(null),
        ] {
            let req: QuoteHttpRequest = serde_json::from_value(serde_json::json!({
                "photoId": Uuid::new_v4(),
                "variantId": Uuid::new_v4(),
                "copies": junk
            }))
            .unwrap();
            assert_eq!(req.copies, None);
        }
    }
}
