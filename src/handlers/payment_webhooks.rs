//! Stripe webhook intake. A verified `payment_intent.succeeded` event is the
//! single trigger for fulfillment; everything the placer needs was stashed in
//! the intent's metadata at checkout time.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::pricing::{OrderPricing, DEFAULT_CURRENCY};
use crate::models::recipient::RecipientInput;
use crate::services::fulfillment::PlaceOrderParams;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Bounded memory of recently handled event ids. Purely a noise filter: the
/// durable exactly-once guarantee is the unique index on the payment id.
/// Ids are recorded only once an event was handled to completion, so a
/// delivery that failed mid-handling stays eligible for redelivery.
#[derive(Debug, Default)]
pub struct SeenEvents {
    set: HashSet<String>,
    order: VecDeque<String>,
}

const SEEN_EVENTS_CAP: usize = 4096;

impl SeenEvents {
    pub fn contains(&self, event_id: &str) -> bool {
        self.set.contains(event_id)
    }

    /// Records the id; returns false when it was already present.
    pub fn insert(&mut self, event_id: &str) -> bool {
        if !self.set.insert(event_id.to_string()) {
            return false;
        }
        self.order.push_back(event_id.to_string());
        while self.order.len() > SEEN_EVENTS_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }
}

/// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 502, description = "Fulfillment placement failed; processor should redeliver", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(ref secret) = state.config.stripe_webhook_secret {
        if !verify_signature(
            &headers,
            &body,
            secret,
            state.config.payment_webhook_tolerance_secs,
        ) {
            warn!("payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;

    let event_id = event
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    if let Some(ref event_id) = event_id {
        let seen = state.webhook_events.lock().await;
        if seen.contains(event_id) {
            info!(event_id = %event_id, "webhook event already processed");
            return Ok((StatusCode::OK, "ok"));
        }
    }

    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let intent = event
        .get("data")
        .and_then(|d| d.get("object"))
        .cloned()
        .unwrap_or(Value::Null);

    match event_type {
        "payment_intent.succeeded" => {
            let params = match place_params_from_intent(&intent) {
                Ok(params) => params,
                Err(reason) => {
                    // Malformed metadata will not improve on redelivery;
                    // acknowledge and leave the trace in the logs.
                    error!(reason, "webhook payment intent is not fulfillable");
                    mark_handled(&state, event_id).await;
                    return Ok((StatusCode::OK, "ok"));
                }
            };
            let payment_intent_id = params
                .payment_intent_id
                .clone()
                .unwrap_or_default();
            let _ = state
                .events
                .send(Event::PaymentSucceeded {
                    payment_intent_id: payment_intent_id.clone(),
                })
                .await;

            // Placement failures surface as 5xx so the processor redelivers;
            // the payment-id idempotency makes the retry safe.
            let placed = state.services.fulfillment.place_order(params).await?;
            info!(
                payment_intent_id = %payment_intent_id,
                already_placed = placed.already_placed,
                recorded = placed.record.is_some(),
                "fulfillment processed for successful payment"
            );
        }
        "payment_intent.payment_failed" => {
            let payment_intent_id = intent
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let reason = intent
                .get("last_payment_error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let _ = state
                .events
                .send(Event::PaymentFailed {
                    payment_intent_id,
                    reason,
                })
                .await;
        }
        other => {
            info!(event_type = other, "ignoring unhandled webhook event type");
        }
    }

    mark_handled(&state, event_id).await;
    Ok((StatusCode::OK, "ok"))
}

/// Records a fully handled event id. Failed deliveries never reach this,
/// so the processor's redelivery of them is processed again rather than
/// suppressed.
async fn mark_handled(state: &AppState, event_id: Option<String>) {
    if let Some(event_id) = event_id {
        state.webhook_events.lock().await.insert(&event_id);
    }
}

/// Stripe-Signature verification: HMAC SHA-256 over `"{t}.{payload}"` with
/// the endpoint secret, plus a timestamp freshness window.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    let Some(header) = headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    else {
        return false;
    };

    let mut timestamp = "";
    let mut v1 = "";
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => timestamp = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }
    if timestamp.is_empty() || v1.is_empty() {
        return false;
    }

    if let Ok(ts) = timestamp.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, v1)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Rebuilds fulfillment input from the metadata written at checkout.
fn place_params_from_intent(intent: &Value) -> Result<PlaceOrderParams, &'static str> {
    let intent_id = intent
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or("payment intent has no id")?;
    let metadata = intent
        .get("metadata")
        .and_then(|m| m.as_object())
        .ok_or("payment intent has no metadata")?;

    let meta_str = |key: &str| {
        metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let photo_id = meta_str("photoId")
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("metadata is missing a valid photoId")?;
    let variant_id = meta_str("variantId")
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("metadata is missing a valid variantId")?;
    let recipient: RecipientInput = meta_str("recipient")
        .and_then(|s| serde_json::from_str(s).ok())
        .ok_or("metadata is missing a usable recipient")?;

    let meta_decimal = |key: &str| {
        meta_str(key)
            .and_then(|s| Decimal::from_str(s).ok())
            .unwrap_or_default()
    };
    let pricing = OrderPricing {
        currency: meta_str("currency")
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        items: meta_decimal("items"),
        shipping: meta_decimal("shipping"),
        tax: meta_decimal("tax"),
        fees: meta_decimal("fees"),
        provider_total: meta_decimal("providerTotal"),
        margin: meta_decimal("margin"),
        total_charged: meta_decimal("totalWithMargin"),
    };

    Ok(PlaceOrderParams {
        photo_id,
        variant_id,
        color_code: meta_str("colorCode").map(str::to_string),
        copies: meta_str("copies").and_then(|s| s.parse::<i64>().ok()),
        recipient,
        shipping_method: meta_str("shippingMethod").map(str::to_string),
        product_attributes: None,
        merchant_reference: Some(intent_id.to_string()),
        payment_intent_id: Some(intent_id.to_string()),
        payment_status: intent
            .get("status")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        pricing: Some(pricing),
        created_by: meta_str("userId").and_then(|s| Uuid::parse_str(s).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signed_headers(payload: &[u8], secret: &str, ts: i64) -> HeaderMap {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", ts).as_bytes());
        mac.update(payload);
        let sig = hex::encode(mac.finalize().into_bytes());
        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            format!("t={},v1={}", ts, sig).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_fresh_valid_signature() {
        let payload = Bytes::from_static(b"{\"id\":\"evt_1\"}");
        let ts = chrono::Utc::now().timestamp();
        let headers = signed_headers(&payload, "whsec_test", ts);
        assert!(verify_signature(&headers, &payload, "whsec_test", 300));
    }

    #[test]
    fn rejects_wrong_secret_and_stale_timestamp() {
        let payload = Bytes::from_static(b"{}");
        let ts = chrono::Utc::now().timestamp();
        let headers = signed_headers(&payload, "whsec_other", ts);
        assert!(!verify_signature(&headers, &payload, "whsec_test", 300));

        let stale = signed_headers(&payload, "whsec_test", ts - 4000);
        assert!(!verify_signature(&stale, &payload, "whsec_test", 300));
    }

    #[test]
    fn rejects_missing_header() {
        let payload = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &payload, "whsec_test", 300));
    }

    #[test]
    fn seen_events_dedupes_and_evicts() {
        let mut seen = SeenEvents::default();
        assert!(!seen.contains("evt_1"));
        assert!(seen.insert("evt_1"));
        assert!(seen.contains("evt_1"));
        assert!(!seen.insert("evt_1"));
        assert!(seen.insert("evt_2"));
    }

    #[test]
    fn rebuilds_placement_params_from_metadata() {
        let recipient = serde_json::json!({
            "name": "Ana",
            "email": "ana@example.com",
            "address": {
                "line1": "Calle Mayor 1",
                "townOrCity": "Madrid",
                "postalOrZipCode": "28001",
                "countryCode": "ES"
            }
        });
        let intent = serde_json::json!({
            "id": "pi_123",
            "status": "succeeded",
            "metadata": {
                "photoId": "8f14e45f-ceea-4e7a-9f2f-2b3c4d5e6f70",
                "variantId": "9b2fb2aa-1111-4e7a-9f2f-2b3c4d5e6f70",
                "colorCode": "BLU",
                "copies": "2",
                "shippingMethod": "Budget",
                "currency": "EUR",
                "items": "30.00",
                "shipping": "6.00",
                "tax": "0.00",
                "fees": "0.00",
                "providerTotal": "36.00",
                "margin": "5.00",
                "totalWithMargin": "41.00",
                "recipient": recipient.to_string()
            }
        });

        let params = place_params_from_intent(&intent).unwrap();
        assert_eq!(params.payment_intent_id.as_deref(), Some("pi_123"));
        assert_eq!(params.merchant_reference.as_deref(), Some("pi_123"));
        assert_eq!(params.copies, Some(2));
        assert_eq!(params.color_code.as_deref(), Some("BLU"));
        let pricing = params.pricing.unwrap();
        assert_eq!(pricing.provider_total, dec!(36));
        assert_eq!(pricing.total_charged, dec!(41));
        assert!(params.recipient.normalize().is_ok());
    }

    #[test]
    fn rejects_intent_without_recipient() {
        let intent = serde_json::json!({
            "id": "pi_123",
            "metadata": {
                "photoId": "8f14e45f-ceea-4e7a-9f2f-2b3c4d5e6f70",
                "variantId": "9b2fb2aa-1111-4e7a-9f2f-2b3c4d5e6f70"
            }
        });
        assert!(place_params_from_intent(&intent).is_err());
    }
}
