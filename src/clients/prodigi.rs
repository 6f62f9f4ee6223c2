//! Thin authenticated HTTP client for the Prodigi print API. No business
//! logic lives here; requests and responses are typed at the boundary and
//! upstream rejections are propagated with their raw payload attached.

use crate::errors::ServiceError;
use crate::models::recipient::NormalizedRecipient;
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ProdigiClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

/// Monetary value as the provider sends it: amount as a decimal string.
/// Missing or unparseable amounts are treated as zero; this is the single
/// place that defaulting rule lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Money {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Money {
    pub fn decimal(&self) -> Decimal {
        self.amount
            .as_deref()
            .and_then(|a| Decimal::from_str(a.trim()).ok())
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    #[serde(default)]
    pub items: Option<Money>,
    #[serde(default)]
    pub shipping: Option<Money>,
    #[serde(default)]
    pub branding: Option<Money>,
    #[serde(default)]
    pub tax: Option<Money>,
    #[serde(default)]
    pub fees: Option<Money>,
    /// The provider's own pre-computed grand total, preferred when present
    #[serde(default)]
    pub total_cost: Option<Money>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuote {
    #[serde(default)]
    pub shipment_method: Option<String>,
    #[serde(default)]
    pub cost_summary: Option<CostSummary>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub quotes: Vec<ProviderQuote>,
    /// Provider-assigned quote identifier, echoed into payment metadata
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub print_area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    pub sku: String,
    pub copies: i32,
    pub attributes: Map<String, Value>,
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub shipping_method: String,
    pub destination_country_code: String,
    pub items: Vec<QuoteItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub merchant_reference: String,
    pub sku: String,
    pub copies: i32,
    pub sizing: String,
    pub attributes: Map<String, Value>,
    pub assets: Vec<AssetEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub merchant_reference: String,
    pub shipping_method: String,
    pub recipient: NormalizedRecipient,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Parsed essentials of a created order, alongside the full raw response
/// which is persisted verbatim on the local record.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub outcome: Option<String>,
    pub order_id: Option<String>,
    pub status_stage: Option<String>,
    pub raw: Value,
}

impl CreatedOrder {
    fn from_raw(raw: Value) -> Self {
        let outcome = raw
            .get("outcome")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let order = raw.get("order");
        let order_id = order
            .and_then(|o| o.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let status_stage = order
            .and_then(|o| o.get("status"))
            .and_then(|s| s.get("stage"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            outcome,
            order_id,
            status_stage,
            raw,
        }
    }
}

/// First-variant attribute map from a live product-details fetch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductDetails {
    #[serde(default)]
    pub product: Option<ProductBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBody {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub variants: Vec<ProductVariantBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductVariantBody {
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

impl ProductDetails {
    pub fn first_variant_attributes(&self) -> Option<Map<String, Value>> {
        self.product
            .as_ref()?
            .variants
            .first()?
            .attributes
            .clone()
            .filter(|m| !m.is_empty())
    }
}

/// Filters accepted by the provider's order listing endpoint, passed through
/// from the administrative surface.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OrderListFilter {
    pub top: Option<u32>,
    pub skip: Option<u32>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub status: Option<String>,
    /// Comma-separated list, expanded to repeated query parameters
    #[serde(default)]
    pub order_ids: Option<String>,
    /// Comma-separated list, expanded to repeated query parameters
    #[serde(default)]
    pub merchant_references: Option<String>,
}

fn split_csv(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl OrderListFilter {
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(top) = self.top {
            pairs.push(("top".to_string(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("skip".to_string(), skip.to_string()));
        }
        if let Some(ref from) = self.created_from {
            pairs.push(("createdFrom".to_string(), from.clone()));
        }
        if let Some(ref to) = self.created_to {
            pairs.push(("createdTo".to_string(), to.clone()));
        }
        if let Some(ref status) = self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        for id in self.order_ids.as_deref().into_iter().flat_map(split_csv) {
            pairs.push(("orderIds".to_string(), id.to_string()));
        }
        for mr in self
            .merchant_references
            .as_deref()
            .into_iter()
            .flat_map(split_csv)
        {
            pairs.push(("merchantReferences".to_string(), mr.to_string()));
        }
        pairs
    }
}

impl ProdigiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries,
        })
    }

    /// Fetch product details by SKU. Retried; the call is idempotent.
    pub async fn get_product(&self, sku: &str) -> Result<ProductDetails, ServiceError> {
        let raw = self
            .execute(Method::GET, &format!("products/{}", sku), &[], None, true)
            .await?;
        serde_json::from_value(raw).map_err(|e| ServiceError::SerializationError(e.to_string()))
    }

    /// Create a price quote. Retried; quoting has no side effects.
    pub async fn create_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, ServiceError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        let raw = self
            .execute(Method::POST, "quotes", &[], Some(body), true)
            .await?;
        serde_json::from_value(raw).map_err(|e| ServiceError::SerializationError(e.to_string()))
    }

    /// Submit an order. Not retried here: the merchant reference is the
    /// idempotency key and redelivery is handled one level up.
    pub async fn create_order(&self, request: &OrderRequest) -> Result<CreatedOrder, ServiceError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        let raw = self
            .execute(Method::POST, "orders", &[], Some(body), false)
            .await?;
        Ok(CreatedOrder::from_raw(raw))
    }

    /// Upload an asset from a URL, returning the provider's asset id.
    pub async fn create_asset_from_url(&self, url: &str) -> Result<String, ServiceError> {
        let body = serde_json::json!({ "url": url });
        let raw = self
            .execute(Method::POST, "photos/assets", &[], Some(body), true)
            .await?;
        raw.get("asset")
            .and_then(|a| a.get("id"))
            .or_else(|| raw.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::upstream("asset upload returned no id", None, Some(raw))
            })
    }

    pub async fn list_orders(&self, filter: &OrderListFilter) -> Result<Value, ServiceError> {
        self.execute(Method::GET, "orders", &filter.query_pairs(), None, true)
            .await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Value, ServiceError> {
        self.execute(Method::GET, &format!("orders/{}", order_id), &[], None, true)
            .await
    }

    pub async fn get_order_actions(&self, order_id: &str) -> Result<Value, ServiceError> {
        self.execute(
            Method::GET,
            &format!("orders/{}/actions", order_id),
            &[],
            None,
            true,
        )
        .await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<Value, ServiceError> {
        self.execute(
            Method::POST,
            &format!("orders/{}/actions/cancel", order_id),
            &[],
            Some(Value::Object(Map::new())),
            false,
        )
        .await
    }

    pub async fn update_shipping_method(
        &self,
        order_id: &str,
        shipping_method: &str,
    ) -> Result<Value, ServiceError> {
        self.execute(
            Method::POST,
            &format!("orders/{}/actions/updateShippingMethod", order_id),
            &[],
            Some(serde_json::json!({ "shippingMethod": shipping_method })),
            false,
        )
        .await
    }

    pub async fn update_recipient(
        &self,
        order_id: &str,
        recipient: &NormalizedRecipient,
    ) -> Result<Value, ServiceError> {
        let body = serde_json::to_value(recipient)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        self.execute(
            Method::POST,
            &format!("orders/{}/actions/updateRecipient", order_id),
            &[],
            Some(body),
            false,
        )
        .await
    }

    pub async fn update_metadata(
        &self,
        order_id: &str,
        metadata: &Value,
    ) -> Result<Value, ServiceError> {
        self.execute(
            Method::POST,
            &format!("orders/{}/actions/updateMetadata", order_id),
            &[],
            Some(serde_json::json!({ "metadata": metadata })),
            false,
        )
        .await
    }

    /// Executes one provider call. Idempotent calls retry on network errors
    /// and 5xx/429 with exponential backoff; 4xx rejections fail immediately
    /// with the raw body attached.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
        idempotent: bool,
    ) -> Result<Value, ServiceError> {
        let url = format!("{}/{}", self.base_url, path);
        let attempts = if idempotent { self.max_retries + 1 } else { 1 };

        let mut last_err: Option<ServiceError> = None;
        for attempt in 1..=attempts {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("X-API-Key", &self.api_key);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(ref b) = body {
                request = request.json(b);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let payload: Value = response.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        return Ok(payload);
                    }
                    let err = ServiceError::upstream(
                        format!("provider rejected {} {} ({})", method, path, status),
                        Some(status.as_u16()),
                        Some(payload),
                    );
                    let retryable = status.is_server_error()
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
                    if !retryable {
                        return Err(err);
                    }
                    warn!(
                        %status,
                        path,
                        attempt,
                        attempts,
                        "provider call failed, will retry if attempts remain"
                    );
                    last_err = Some(err);
                }
                Err(e) => {
                    warn!(error = %e, path, attempt, attempts, "provider call errored");
                    last_err = Some(ServiceError::upstream(
                        format!("provider unreachable: {}", e),
                        None,
                        None,
                    ));
                }
            }

            if attempt < attempts {
                let backoff = Duration::from_millis(250 * 2_u64.pow(attempt - 1));
                debug!(?backoff, path, "backing off before provider retry");
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| ServiceError::upstream("provider call failed", None, None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_defaults_missing_amounts_to_zero() {
        assert_eq!(Money::default().decimal(), Decimal::ZERO);
        let m: Money = serde_json::from_value(serde_json::json!({"amount": "12.34"})).unwrap();
        assert_eq!(m.decimal(), dec!(12.34));
        let bad: Money =
            serde_json::from_value(serde_json::json!({"amount": "not-a-number"})).unwrap();
        assert_eq!(bad.decimal(), Decimal::ZERO);
    }

    #[test]
    fn created_order_extracts_id_and_stage() {
        let raw = serde_json::json!({
            "outcome": "Created",
            "order": {
                "id": "ord_12345",
                "status": { "stage": "InProgress" }
            }
        });
        let created = CreatedOrder::from_raw(raw);
        assert_eq!(created.order_id.as_deref(), Some("ord_12345"));
        assert_eq!(created.status_stage.as_deref(), Some("InProgress"));
        assert_eq!(created.outcome.as_deref(), Some("Created"));
    }

    #[test]
    fn created_order_tolerates_missing_order_body() {
        let created = CreatedOrder::from_raw(serde_json::json!({ "outcome": "Created" }));
        assert!(created.order_id.is_none());
        assert!(created.status_stage.is_none());
    }

    #[test]
    fn filter_builds_repeated_query_pairs() {
        let filter = OrderListFilter {
            top: Some(10),
            status: Some("InProgress".into()),
            merchant_references: Some("a, b".into()),
            ..Default::default()
        };
        let pairs = filter.query_pairs();
        assert!(pairs.contains(&("top".to_string(), "10".to_string())));
        assert_eq!(
            pairs
                .iter()
                .filter(|(k, _)| k == "merchantReferences")
                .count(),
            2
        );
    }

    #[test]
    fn product_details_first_variant_attributes() {
        let details: ProductDetails = serde_json::from_value(serde_json::json!({
            "product": {
                "sku": "GLOBAL-CAN-10x10",
                "variants": [
                    { "attributes": { "wrap": "ImageWrap" } },
                    { "attributes": { "wrap": "MirrorWrap" } }
                ]
            }
        }))
        .unwrap();
        let attrs = details.first_variant_attributes().unwrap();
        assert_eq!(attrs.get("wrap").and_then(|v| v.as_str()), Some("ImageWrap"));
    }
}
