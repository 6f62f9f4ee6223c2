pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::handlers::payment_webhooks::SeenEvents;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub events: EventSender,
    pub services: handlers::AppServices,
    /// Recently handled webhook event ids
    pub webhook_events: Arc<Mutex<SeenEvents>>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        events: EventSender,
        services: handlers::AppServices,
    ) -> Self {
        Self {
            db,
            config,
            events,
            services,
            webhook_events: Arc::new(Mutex::new(SeenEvents::default())),
        }
    }
}

/// Common response wrapper for status/health endpoints.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// All v1 API routes. The state value is needed up front because the admin
/// guard is a stateful middleware layer.
pub fn api_v1_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/orders", get(handlers::admin_orders::list_orders))
        .route("/orders/:id", get(handlers::admin_orders::get_order))
        .route(
            "/orders/:id/actions",
            get(handlers::admin_orders::get_order_actions),
        )
        .route(
            "/orders/:id/actions/cancel",
            post(handlers::admin_orders::cancel_order),
        )
        .route(
            "/orders/:id/actions/update-shipping",
            post(handlers::admin_orders::update_shipping_method),
        )
        .route(
            "/orders/:id/actions/update-recipient",
            post(handlers::admin_orders::update_recipient),
        )
        .route(
            "/orders/:id/actions/update-metadata",
            post(handlers::admin_orders::update_metadata),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            auth::require_admin_key,
        ));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .route("/quote", post(handlers::quotes::create_quote))
        .route(
            "/checkout/payment-intent",
            post(handlers::checkout::create_payment_intent),
        )
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .nest("/admin", admin)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "printfolio-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health_data)))
}

/// Request logging middleware
pub async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = duration.as_millis() as u64,
        "request completed"
    );

    response
}
