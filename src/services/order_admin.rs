//! Administrative passthrough to the provider's order management API. The
//! provider stays the source of truth for order state; local records are
//! placement-time snapshots and are not rewritten here.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use crate::clients::prodigi::{OrderListFilter, ProdigiClient};
use crate::errors::ServiceError;
use crate::models::recipient::RecipientInput;

#[derive(Clone)]
pub struct OrderAdminService {
    prodigi: Arc<ProdigiClient>,
}

impl OrderAdminService {
    pub fn new(prodigi: Arc<ProdigiClient>) -> Self {
        Self { prodigi }
    }

    pub async fn list_orders(&self, filter: &OrderListFilter) -> Result<Value, ServiceError> {
        self.prodigi.list_orders(filter).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Value, ServiceError> {
        self.prodigi.get_order(order_id).await
    }

    /// Which mutating actions the provider currently allows on the order.
    pub async fn get_order_actions(&self, order_id: &str) -> Result<Value, ServiceError> {
        self.prodigi.get_order_actions(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<Value, ServiceError> {
        let response = self.prodigi.cancel_order(order_id).await?;
        info!(order_id, "order cancellation requested");
        Ok(response)
    }

    #[instrument(skip(self))]
    pub async fn update_shipping_method(
        &self,
        order_id: &str,
        shipping_method: &str,
    ) -> Result<Value, ServiceError> {
        let shipping_method = shipping_method.trim();
        if shipping_method.is_empty() {
            return Err(ServiceError::InvalidInput(
                "shippingMethod must not be empty".into(),
            ));
        }
        self.prodigi
            .update_shipping_method(order_id, shipping_method)
            .await
    }

    /// Recipient updates go through the same normalization as checkout, so
    /// the provider only ever sees the canonical shape.
    #[instrument(skip(self, recipient))]
    pub async fn update_recipient(
        &self,
        order_id: &str,
        recipient: &RecipientInput,
    ) -> Result<Value, ServiceError> {
        let normalized = recipient.normalize()?;
        self.prodigi.update_recipient(order_id, &normalized).await
    }

    #[instrument(skip(self, metadata))]
    pub async fn update_metadata(
        &self,
        order_id: &str,
        metadata: &Value,
    ) -> Result<Value, ServiceError> {
        if !metadata.is_object() {
            return Err(ServiceError::InvalidInput(
                "metadata must be a JSON object".into(),
            ));
        }
        self.prodigi.update_metadata(order_id, metadata).await
    }
}
