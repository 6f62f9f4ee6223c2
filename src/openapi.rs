use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Printfolio API",
        version = "0.3.0",
        description = r#"
# Printfolio Print Fulfillment API

Pricing and fulfillment backend for photographic prints. Quotes are taken
live from the print provider with the platform margin applied on top;
payment is collected through payment intents, and a confirmed payment
triggers exactly one provider order.

## Authentication

Administrative order endpoints require the admin API key in the
`x-admin-key` header (or as a bearer token). Quote and checkout endpoints
are public; the webhook endpoint is signature-verified.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Quotes", description = "Live provider quoting with margin"),
        (name = "Checkout", description = "Payment intent creation"),
        (name = "Payments", description = "Payment processor webhooks"),
        (name = "Admin", description = "Provider order management"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::quotes::create_quote,
        crate::handlers::checkout::create_payment_intent,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::admin_orders::list_orders,
        crate::handlers::admin_orders::get_order,
        crate::handlers::admin_orders::get_order_actions,
        crate::handlers::admin_orders::cancel_order,
        crate::handlers::admin_orders::update_shipping_method,
        crate::handlers::admin_orders::update_recipient,
        crate::handlers::admin_orders::update_metadata,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::models::pricing::PricingBreakdown,
        crate::models::pricing::OrderPricing,
        crate::models::recipient::RecipientInput,
        crate::models::recipient::StructuredRecipient,
        crate::models::recipient::StructuredAddress,
        crate::models::recipient::FlatRecipient,
        crate::models::recipient::NormalizedRecipient,
        crate::models::recipient::NormalizedAddress,
        crate::handlers::quotes::QuoteHttpRequest,
        crate::handlers::quotes::QuoteHttpResponse,
        crate::handlers::checkout::CheckoutHttpRequest,
        crate::handlers::checkout::CheckoutHttpResponse,
        crate::handlers::admin_orders::UpdateShippingRequest,
    )),
    modifiers(&AdminSecurity)
)]
pub struct ApiDoc;

struct AdminSecurity;

impl Modify for AdminSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-admin-key"))),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/quote"));
        assert!(doc.paths.paths.contains_key("/api/v1/checkout/payment-intent"));
        assert!(doc.paths.paths.contains_key("/api/v1/admin/orders/{id}/actions/cancel"));
    }
}
