use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::created_response;
use crate::handlers::quotes::lenient_copies;
use crate::models::pricing::PricingBreakdown;
use crate::models::recipient::RecipientInput;
use crate::services::payments::CheckoutParams;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutHttpRequest {
    pub photo_id: Uuid,
    pub variant_id: Uuid,
    pub recipient: RecipientInput,
    #[serde(default)]
    pub color_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_copies")]
    #[schema(value_type = Option<i64>)]
    pub copies: Option<i64>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub product_attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub asset_url: Option<String>,
    /// Authenticated storefront user, when known
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutHttpResponse {
    pub payment_intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Minor units actually charged
    pub amount: i64,
    pub currency: String,
    pub pricing: PricingBreakdown,
}

/// POST /api/v1/checkout/payment-intent
#[utoipa::path(
    post,
    path = "/api/v1/checkout/payment-intent",
    request_body = CheckoutHttpRequest,
    responses(
        (status = 201, description = "Payment intent opened", body = CheckoutHttpResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Photo or variant not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider or payment processor failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<CheckoutHttpRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let intent = state
        .services
        .payments
        .create_order_payment(CheckoutParams {
            photo_id: request.photo_id,
            variant_id: request.variant_id,
            color_code: request.color_code,
            copies: request.copies,
            recipient: request.recipient,
            shipping_method: request.shipping_method,
            product_attributes: request.product_attributes,
            asset_override_url: request.asset_url,
            user_id: request.user_id,
        })
        .await?;

    Ok(created_response(CheckoutHttpResponse {
        payment_intent_id: intent.payment_intent_id,
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
        pricing: intent.pricing,
    }))
}
