//! Stripe payment-intent client. Form-encoded requests, bearer-authenticated
//! with the secret key; the webhook signature check lives with the webhook
//! handler.

use crate::errors::ServiceError;
use crate::models::recipient::NormalizedRecipient;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    /// Integer minor units
    pub amount: i64,
    /// Lowercase ISO code
    pub currency: String,
    pub description: String,
    /// String-keyed, string-valued bag; everything needed to later place the
    /// fulfillment order without re-deriving it from client input
    pub metadata: BTreeMap<String, String>,
    pub shipping: Option<NormalizedRecipient>,
}

impl StripeClient {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    pub async fn create_payment_intent(
        &self,
        request: &CreatePaymentIntent,
    ) -> Result<PaymentIntent, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount.to_string()),
            ("currency".into(), request.currency.to_lowercase()),
            ("description".into(), request.description.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        if let Some(ref recipient) = request.shipping {
            form.push(("shipping[name]".into(), recipient.name.clone()));
            if let Some(ref phone) = recipient.phone_number {
                form.push(("shipping[phone]".into(), phone.clone()));
            }
            form.push((
                "shipping[address][line1]".into(),
                recipient.address.line1.clone(),
            ));
            if let Some(ref line2) = recipient.address.line2 {
                form.push(("shipping[address][line2]".into(), line2.clone()));
            }
            form.push((
                "shipping[address][city]".into(),
                recipient.address.town_or_city.clone(),
            ));
            if let Some(ref state) = recipient.address.state_or_county {
                form.push(("shipping[address][state]".into(), state.clone()));
            }
            form.push((
                "shipping[address][postal_code]".into(),
                recipient.address.postal_or_zip_code.clone(),
            ));
            form.push((
                "shipping[address][country]".into(),
                recipient.address.country_code.clone(),
            ));
        }

        self.post_form("/v1/payment_intents", &form).await
    }

    /// Update a payment intent's metadata after creation. Used to set the
    /// merchant reference to the intent's own id.
    pub async fn update_payment_intent_metadata(
        &self,
        payment_intent_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, ServiceError> {
        let form: Vec<(String, String)> = metadata
            .iter()
            .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
            .collect();
        self.post_form(&format!("/v1/payment_intents/{}", payment_intent_id), &form)
            .await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                ServiceError::upstream(format!("payment processor unreachable: {}", e), None, None)
            })?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            warn!(%status, path, "payment processor rejected request");
            return Err(ServiceError::upstream(
                format!("payment processor rejected {} ({})", path, status),
                Some(status.as_u16()),
                Some(payload),
            ));
        }

        serde_json::from_value(payload)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))
    }
}
