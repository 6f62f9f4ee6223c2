//! Administrative order management, proxied to the provider. Responses are
//! relayed verbatim; the provider owns order state.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::clients::prodigi::OrderListFilter;
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::models::recipient::RecipientInput;
use crate::AppState;

/// GET /api/v1/admin/orders
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(OrderListFilter),
    responses(
        (status = 200, description = "Provider order listing"),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider failure", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderListFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.order_admin.list_orders(&filter).await?;
    Ok(success_response(orders))
}

/// GET /api/v1/admin/orders/:id
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}",
    params(("id" = String, Path, description = "Provider order id")),
    responses(
        (status = 200, description = "Provider order"),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider failure", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.order_admin.get_order(&id).await?;
    Ok(success_response(order))
}

/// GET /api/v1/admin/orders/:id/actions
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}/actions",
    params(("id" = String, Path, description = "Provider order id")),
    responses(
        (status = 200, description = "Actions currently allowed on the order"),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn get_order_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let actions = state.services.order_admin.get_order_actions(&id).await?;
    Ok(success_response(actions))
}

/// POST /api/v1/admin/orders/:id/actions/cancel
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/actions/cancel",
    params(("id" = String, Path, description = "Provider order id")),
    responses(
        (status = 200, description = "Cancellation outcome"),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider refused the cancellation", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.order_admin.cancel_order(&id).await?;
    Ok(success_response(outcome))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShippingRequest {
    pub shipping_method: String,
}

/// POST /api/v1/admin/orders/:id/actions/update-shipping
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/actions/update-shipping",
    params(("id" = String, Path, description = "Provider order id")),
    request_body = UpdateShippingRequest,
    responses(
        (status = 200, description = "Update outcome"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn update_shipping_method(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<UpdateShippingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .order_admin
        .update_shipping_method(&id, &request.shipping_method)
        .await?;
    Ok(success_response(outcome))
}

/// POST /api/v1/admin/orders/:id/actions/update-recipient
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/actions/update-recipient",
    params(("id" = String, Path, description = "Provider order id")),
    request_body = RecipientInput,
    responses(
        (status = 200, description = "Update outcome"),
        (status = 400, description = "Recipient failed normalization", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn update_recipient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(recipient): axum::Json<RecipientInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .order_admin
        .update_recipient(&id, &recipient)
        .await?;
    Ok(success_response(outcome))
}

/// POST /api/v1/admin/orders/:id/actions/update-metadata
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/actions/update-metadata",
    params(("id" = String, Path, description = "Provider order id")),
    responses(
        (status = 200, description = "Update outcome"),
        (status = 400, description = "Metadata must be a JSON object", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::errors::ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn update_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(metadata): axum::Json<Value>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .order_admin
        .update_metadata(&id, &metadata)
        .await?;
    Ok(success_response(outcome))
}
