use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::clients::prodigi::ProdigiClient;
use crate::clients::stripe::StripeClient;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::assets::AssetResolver;
use crate::services::fulfillment::FulfillmentService;
use crate::services::order_admin::OrderAdminService;
use crate::services::payments::PaymentService;
use crate::services::quotes::QuoteService;
use crate::services::variants::VariantResolver;

pub mod admin_orders;
pub mod checkout;
pub mod common;
pub mod payment_webhooks;
pub mod quotes;

/// Service container shared by all handlers through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub quotes: Arc<QuoteService>,
    pub payments: Arc<PaymentService>,
    pub fulfillment: Arc<FulfillmentService>,
    pub order_admin: Arc<OrderAdminService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        events: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let prodigi = Arc::new(ProdigiClient::new(
            config.prodigi_base_url.clone(),
            config.prodigi_api_key.clone(),
            config.upstream_timeout(),
            config.upstream_retries,
        )?);
        let stripe = Arc::new(StripeClient::new(
            config.stripe_base_url.clone(),
            config.stripe_secret_key.clone(),
            config.upstream_timeout(),
        )?);

        let assets = AssetResolver::new(prodigi.clone());
        let variants = VariantResolver::new(db.clone());

        let quotes = Arc::new(QuoteService::new(
            prodigi.clone(),
            assets.clone(),
            variants.clone(),
            config,
        ));
        let payments = Arc::new(PaymentService::new(quotes.clone(), stripe));
        let fulfillment = Arc::new(FulfillmentService::new(
            db,
            prodigi.clone(),
            assets,
            variants,
            events,
            config,
        ));
        let order_admin = Arc::new(OrderAdminService::new(prodigi));

        Ok(Self {
            quotes,
            payments,
            fulfillment,
            order_admin,
        })
    }
}
