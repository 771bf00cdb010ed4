//! Checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::{
    AddressId, CartId, Money, OrderId, OrderItemId, ProductId, SizeVariantId, UserId, VariantId,
};
use domain::{
    CheckoutLine, CheckoutRequest, CheckoutService, CheckoutSource, OrderLifecycleService,
    OrderView,
};
use serde::{Deserialize, Serialize};
use store::{CheckoutStore, Order};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CheckoutStore> {
    pub checkout: CheckoutService<S>,
    pub lifecycle: OrderLifecycleService<S>,
}

// -- Request types --

/// Body of `POST /checkout/create-checkout`, both shapes.
///
/// Cart checkout sends `cartId`; direct purchase sends `items`. Exactly
/// one of the two must be present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub cart_id: Option<CartId>,
    #[serde(default)]
    pub items: Option<Vec<DirectItemRequest>>,
    pub address_id: AddressId,
    pub shipping_method: String,
    pub payment_method: String,
    pub transaction_id: String,
    pub payment_status: String,
    pub final_total: Money,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectItemRequest {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub size_variant_id: SizeVariantId,
    pub quantity: u32,
    /// Accepted for wire compatibility with the storefront client but
    /// never used: the ledger price snapshot is authoritative.
    #[serde(default)]
    pub price: Option<Money>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnProductRequest {
    pub reason: String,
    pub details: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutCreatedResponse {
    pub success: bool,
    pub message: String,
    pub order: Order,
}

#[derive(Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderView>,
}

#[derive(Serialize)]
pub struct OrderUpdatedResponse {
    pub success: bool,
    pub order: Order,
}

// -- Handlers --

/// POST /checkout/create-checkout — place an order from a cart or a
/// direct-purchase payload.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: CheckoutStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutCreatedResponse>), ApiError> {
    let user_id = user_id_from_headers(&headers)?;

    let source = match (req.cart_id, req.items) {
        (Some(cart_id), None) => CheckoutSource::Cart { cart_id },
        (None, Some(items)) => CheckoutSource::Direct {
            items: items
                .into_iter()
                .map(|i| CheckoutLine {
                    product_id: i.product_id,
                    variant_id: i.variant_id,
                    size_variant_id: i.size_variant_id,
                    quantity: i.quantity,
                })
                .collect(),
        },
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Provide either cartId or items, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either cartId or items is required".to_string(),
            ));
        }
    };

    let order = state
        .checkout
        .create_checkout(
            user_id,
            CheckoutRequest {
                source,
                address_id: req.address_id,
                shipping_method: req.shipping_method,
                payment_method: req.payment_method,
                transaction_id: req.transaction_id,
                payment_status: req.payment_status,
                final_total: req.final_total,
                coupon_code: req.coupon_code,
                discount_amount: req.discount_amount,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutCreatedResponse {
            success: true,
            message: "Order created successfully".to_string(),
            order,
        }),
    ))
}

/// GET /checkout/get-orders — the user's order history, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn get_orders<S: CheckoutStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<OrdersResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;
    let orders = state.lifecycle.list_orders(user_id).await?;

    // The storefront client treats an empty history as 404, so an empty
    // list is reported as not-found rather than as an empty 200.
    if orders.is_empty() {
        return Err(ApiError::NotFound("No orders found".to_string()));
    }

    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

/// PATCH /checkout/cancel-order/:order_id/:item_id — cancel one line and
/// restore its stock.
#[tracing::instrument(skip(state, headers, req))]
pub async fn cancel_order<S: CheckoutStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path((order_id, item_id)): Path<(OrderId, OrderItemId)>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderUpdatedResponse>, ApiError> {
    let _ = user_id_from_headers(&headers)?;

    let order = state
        .lifecycle
        .cancel_item(order_id, item_id, req.reason)
        .await?;

    Ok(Json(OrderUpdatedResponse {
        success: true,
        order,
    }))
}

/// PATCH /checkout/return-product/:order_id/:item_id — flag a delivered
/// line for return.
#[tracing::instrument(skip(state, headers, req))]
pub async fn return_product<S: CheckoutStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path((order_id, item_id)): Path<(OrderId, OrderItemId)>,
    Json(req): Json<ReturnProductRequest>,
) -> Result<Json<OrderUpdatedResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers)?;

    let order = state
        .lifecycle
        .return_product(user_id, order_id, item_id, req.reason, req.details)
        .await?;

    Ok(Json(OrderUpdatedResponse {
        success: true,
        order,
    }))
}

/// Reads the authenticated user id set by the upstream identity layer.
fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("x-user-id")
        .ok_or_else(|| ApiError::BadRequest("Missing x-user-id header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::BadRequest("Invalid x-user-id header".to_string()))?;

    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid x-user-id header: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}
