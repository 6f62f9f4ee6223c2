//! End-to-end flow tests against mocked provider and processor endpoints:
//! quoting with margin, webhook-driven placement, and redelivery collapsing
//! onto a single provider order.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use printfolio_api as api;

use api::config::AppConfig;
use api::entities::{catalog_product, photo, photo_variant, print_order};
use api::models::pricing::OrderPricing;
use api::services::quotes::{summarize_quote, QuoteParams};

struct TestHarness {
    state: api::AppState,
    prodigi: MockServer,
    photo_id: Uuid,
    variant_id: Uuid,
}

fn test_config(prodigi_url: &str, stripe_url: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "debug".into(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        prodigi_api_key: "prodigi-test-key".into(),
        prodigi_base_url: prodigi_url.into(),
        stripe_secret_key: "sk_test_123".into(),
        stripe_base_url: stripe_url.into(),
        stripe_webhook_secret: None,
        payment_webhook_tolerance_secs: 300,
        default_shipping_method: "Budget".into(),
        default_destination_country: "ES".into(),
        public_base_url: "https://pub.example".into(),
        upstream_timeout_secs: 5,
        upstream_retries: 0,
        admin_api_key: "admin-test-key".into(),
    }
}

async fn setup() -> TestHarness {
    let prodigi = MockServer::start().await;
    let stripe = MockServer::start().await;
    let cfg = Arc::new(test_config(&prodigi.uri(), &stripe.uri()));

    let db = Database::connect(cfg.database_url.clone())
        .await
        .expect("sqlite connect");
    api::migrator::Migrator::up(&db, None).await.expect("migrate");
    let db = Arc::new(db);

    let photo_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    let variant_id = Uuid::new_v4();

    photo::ActiveModel {
        id: Set(photo_id),
        title: Set("Alhambra at dusk".into()),
        description: Set(None),
        price: Set(dec!(120)),
        tags: Set(None),
        image_path: Set("photos/alhambra.jpg".into()),
        owner_id: Set(None),
        camera: Set(None),
        location: Set(Some("Granada".into())),
        shot_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db.as_ref())
    .await
    .expect("insert photo");

    catalog_product::ActiveModel {
        id: Set(product_id),
        sku: Set("GLOBAL-CAN-10X10".into()),
        name: Set("Canvas 10x10".into()),
        description: Set(None),
        base_price: Set(dec!(20)),
        currency: Set("EUR".into()),
        default_sizing: Set(None),
        default_shipping_method: Set(None),
        color_options: Set(None),
        provider_details: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db.as_ref())
    .await
    .expect("insert product");

    photo_variant::ActiveModel {
        id: Set(variant_id),
        photo_id: Set(photo_id),
        catalog_product_id: Set(product_id),
        name: Set(Some("Canvas".into())),
        description: Set(None),
        retail_price: Set(None),
        currency: Set(Some("EUR".into())),
        profit_margin: Set(dec!(5)),
        sizing: Set(None),
        asset_url: Set(Some("https://cdn.example/variant.jpg".into())),
        asset_details: Set(None),
        mockups: Set(None),
        color_options: Set(Some(serde_json::json!([
            {"code": "BLU", "name": "Azul"},
            {"code": "RED", "name": "Rojo"}
        ]))),
        provider_attributes: Set(Some(serde_json::json!({"wrap": "ImageWrap"}))),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db.as_ref())
    .await
    .expect("insert variant");

    let (event_tx, event_rx) = mpsc::channel(64);
    let events = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    let services =
        api::handlers::AppServices::new(db.clone(), events.clone(), &cfg).expect("services");
    let state = api::AppState::new(db, cfg, events, services);

    TestHarness {
        state,
        prodigi,
        photo_id,
        variant_id,
    }
}

fn quote_body() -> serde_json::Value {
    serde_json::json!({
        "outcome": "Created",
        "quotes": [{
            "shipmentMethod": "Budget",
            "costSummary": {
                "items": { "amount": "30.00", "currency": "EUR" },
                "shipping": { "amount": "6.00", "currency": "EUR" },
                "totalCost": { "amount": "36.00", "currency": "EUR" }
            }
        }]
    })
}

fn order_created_body() -> serde_json::Value {
    serde_json::json!({
        "outcome": "Created",
        "order": {
            "id": "ord_789",
            "status": { "stage": "InProgress" }
        }
    })
}

async fn mock_asset_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/photos/assets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "asset": { "id": "ast_42" } })),
        )
        .mount(server)
        .await;
}

fn webhook_event(event_id: &str, intent_id: &str, photo_id: Uuid, variant_id: Uuid) -> serde_json::Value {
    let recipient = serde_json::json!({
        "name": "Ana Torres",
        "email": "ana@example.com",
        "address": {
            "line1": "Calle Mayor 1",
            "townOrCity": "Madrid",
            "postalOrZipCode": "28001",
            "countryCode": "ES"
        }
    });
    serde_json::json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id,
                "status": "succeeded",
                "metadata": {
                    "photoId": photo_id.to_string(),
                    "variantId": variant_id.to_string(),
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
            }
        }
    })
}

#[tokio::test]
async fn quote_applies_margin_on_top_of_provider_total() {
    let harness = setup().await;
    mock_asset_upload(&harness.prodigi).await;
    Mock::given(method("POST"))
        .and(path("/quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body()))
        .expect(1)
        .mount(&harness.prodigi)
        .await;

    let quote = harness
        .state
        .services
        .quotes
        .compute_quote(QuoteParams {
            photo_id: harness.photo_id,
            variant_id: harness.variant_id,
            copies: Some(2),
            ..Default::default()
        })
        .await
        .expect("quote");

    assert_eq!(quote.copies, 2);
    assert_eq!(quote.shipping_method, "Budget");
    assert_eq!(quote.destination_country_code, "ES");
    assert_eq!(
        quote.resolved.selected_color.as_ref().map(|c| c.code.as_str()),
        Some("BLU")
    );

    let pricing = summarize_quote(&quote.response, quote.resolved.variant.effective_margin());
    assert_eq!(pricing.provider_total, dec!(36));
    assert_eq!(pricing.margin, dec!(5));
    assert_eq!(pricing.total_with_margin, dec!(41));
}

#[tokio::test]
async fn quote_for_unknown_variant_is_not_found() {
    let harness = setup().await;
    let err = harness
        .state
        .services
        .quotes
        .compute_quote(QuoteParams {
            photo_id: harness.photo_id,
            variant_id: Uuid::new_v4(),
            ..Default::default()
        })
        .await
        .expect_err("missing variant");
    assert!(matches!(err, api::errors::ServiceError::NotFound(_)));
}

#[tokio::test]
async fn webhook_places_order_once_across_redeliveries() {
    let harness = setup().await;
    mock_asset_upload(&harness.prodigi).await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_created_body()))
        .expect(1)
        .mount(&harness.prodigi)
        .await;

    let app = axum::Router::new()
        .nest("/api/v1", api::api_v1_routes(harness.state.clone()))
        .with_state(harness.state.clone());

    // Same payment delivered under two distinct event ids
    for event_id in ["evt_1", "evt_2"] {
        let body = webhook_event(event_id, "pi_123", harness.photo_id, harness.variant_id);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/payments/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let records = print_order::Entity::find()
        .filter(print_order::Column::PaymentIntentId.eq("pi_123"))
        .all(harness.state.db.as_ref())
        .await
        .expect("query records");
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.merchant_reference, "pi_123");
    assert_eq!(record.provider_order_id, "ord_789");
    assert_eq!(record.outcome.as_deref(), Some("Created"));
    assert_eq!(record.provider_status.as_deref(), Some("InProgress"));
    assert_eq!(record.copies, 2);
    assert_eq!(record.color_code.as_deref(), Some("BLU"));
    assert_eq!(record.payment_status.as_deref(), Some("succeeded"));

    let pricing: OrderPricing =
        serde_json::from_value(record.pricing.clone()).expect("pricing json");
    assert_eq!(pricing.provider_total, dec!(36));
    assert_eq!(pricing.margin, dec!(5));
    assert_eq!(pricing.total_charged, dec!(41));

    let recipient = record.recipient.clone();
    assert_eq!(recipient["name"], "Ana Torres");
    assert_eq!(recipient["address"]["countryCode"], "ES");

    // The record keeps the metadata block that went out with the order
    let metadata = record.metadata.clone().expect("order metadata");
    assert_eq!(metadata["source"], "printfolio");
    assert_eq!(metadata["photoId"], harness.photo_id.to_string());
    assert_eq!(metadata["variantId"], harness.variant_id.to_string());
    assert_eq!(metadata["colorCode"], "BLU");
}

#[tokio::test]
async fn webhook_redelivery_after_provider_failure_places_order() {
    let harness = setup().await;
    mock_asset_upload(&harness.prodigi).await;
    // First placement attempt fails upstream, the redelivery succeeds
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "outcome": "Failed"
        })))
        .up_to_n_times(1)
        .mount(&harness.prodigi)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_created_body()))
        .expect(1)
        .mount(&harness.prodigi)
        .await;

    let app = axum::Router::new()
        .nest("/api/v1", api::api_v1_routes(harness.state.clone()))
        .with_state(harness.state.clone());

    let body = webhook_event("evt_same", "pi_456", harness.photo_id, harness.variant_id);
    let deliver = |payload: String| {
        let app = app.clone();
        async move {
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/payments/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    let first = deliver(body.to_string()).await;
    assert_eq!(first.status(), StatusCode::BAD_GATEWAY);

    // The processor redelivers the identical event id after a failure;
    // the failed attempt must not have claimed it.
    let second = deliver(body.to_string()).await;
    assert_eq!(second.status(), StatusCode::OK);

    let records = print_order::Entity::find()
        .filter(print_order::Column::PaymentIntentId.eq("pi_456"))
        .all(harness.state.db.as_ref())
        .await
        .expect("query records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].provider_order_id, "ord_789");
}

#[tokio::test]
async fn webhook_with_broken_metadata_is_acknowledged_without_order() {
    let harness = setup().await;

    let app = axum::Router::new()
        .nest("/api/v1", api::api_v1_routes(harness.state.clone()))
        .with_state(harness.state.clone());

    let body = serde_json::json!({
        "id": "evt_bad",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_bad", "metadata": {} } }
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let count = print_order::Entity::find()
        .all(harness.state.db.as_ref())
        .await
        .expect("query records")
        .len();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn admin_routes_require_the_api_key() {
    let harness = setup().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "orders": [] })),
        )
        .mount(&harness.prodigi)
        .await;

    let app = axum::Router::new()
        .nest("/api/v1", api::api_v1_routes(harness.state.clone()))
        .with_state(harness.state.clone());

    let denied = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/admin/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/admin/orders")
                .header("x-admin-key", "admin-test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn provider_rejection_surfaces_as_bad_gateway_detail() {
    let harness = setup().await;
    mock_asset_upload(&harness.prodigi).await;
    Mock::given(method("POST"))
        .and(path("/quotes"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "outcome": "ValidationFailed",
            "issues": [{ "errorCode": "items.sku.Invalid" }]
        })))
        .mount(&harness.prodigi)
        .await;

    let err = harness
        .state
        .services
        .quotes
        .compute_quote(QuoteParams {
            photo_id: harness.photo_id,
            variant_id: harness.variant_id,
            ..Default::default()
        })
        .await
        .expect_err("provider rejection");

    match err {
        api::errors::ServiceError::UpstreamError { status, detail, .. } => {
            assert_eq!(status, Some(400));
            let detail = detail.expect("raw payload attached");
            assert_eq!(detail["outcome"], "ValidationFailed");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn placement_without_payment_id_synthesizes_reference() {
    let harness = setup().await;
    mock_asset_upload(&harness.prodigi).await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_created_body()))
        .mount(&harness.prodigi)
        .await;

    let recipient: api::models::recipient::RecipientInput =
        serde_json::from_value(serde_json::json!({
            "name": "Ana Torres",
            "email": "ana@example.com",
            "addressLine1": "Calle Mayor 1",
            "city": "Madrid",
            "postalCode": "28001",
            "countryCode": "es"
        }))
        .unwrap();

    let placed = harness
        .state
        .services
        .fulfillment
        .place_order(api::services::fulfillment::PlaceOrderParams {
            photo_id: harness.photo_id,
            variant_id: harness.variant_id,
            color_code: Some("red".into()),
            copies: Some(15),
            recipient,
            shipping_method: None,
            product_attributes: None,
            merchant_reference: None,
            payment_intent_id: None,
            payment_status: None,
            pricing: None,
            created_by: None,
        })
        .await
        .expect("placement");

    assert!(!placed.already_placed);
    let record = placed.record.expect("record persisted");
    assert!(record.merchant_reference.starts_with(&harness.photo_id.to_string()));
    assert_eq!(record.copies, 10);
    assert_eq!(record.color_code.as_deref(), Some("RED"));
    // Flat recipient normalized: country uppercased
    assert_eq!(record.recipient["address"]["countryCode"], "ES");
    let pricing: OrderPricing =
        serde_json::from_value(record.pricing.clone()).expect("pricing json");
    assert_eq!(pricing.total_charged, Decimal::ZERO);
}
