//! Display projection for order history.
//!
//! Orders store only ids and price snapshots; the history endpoint joins
//! in catalog names, images, colors and sizes so clients can render a
//! line without further lookups.

use chrono::{DateTime, Utc};
use serde::Serialize;

use common::{ItemStatus, Money, OrderId, OrderItemId, OrderStatus};
use store::{CheckoutStore, Order};

use crate::error::CheckoutError;

/// One order line enriched with catalog display fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub item_id: OrderItemId,
    pub product_name: String,
    pub image_url: String,
    pub color: String,
    pub size: String,
    pub quantity: u32,
    pub price: Money,
    pub line_total: Money,
    pub status: ItemStatus,
    pub return_requested: bool,
    pub return_status: Option<String>,
}

/// An order shaped for the history listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    pub total_amount: Money,
    pub delivery_charge: Money,
    pub sub_total: Money,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

/// Projects an order into its display shape.
///
/// Catalog records can lag behind or be retired; missing ones degrade to
/// empty display fields rather than failing the whole listing.
pub async fn project_order<S: CheckoutStore>(
    store: &S,
    order: Order,
) -> Result<OrderView, CheckoutError> {
    let sub_total = order.subtotal();
    let mut lines = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let product = store.product(line.product_id).await?;
        let variant = store.variant(line.variant_id).await?;
        let unit = store.inventory_unit(line.size_variant_id).await?;

        let (product_name, image_url) = product
            .map(|p| (p.name, p.image_url))
            .unwrap_or_default();
        lines.push(OrderLineView {
            item_id: line.id,
            product_name,
            image_url,
            color: variant.map(|v| v.color).unwrap_or_default(),
            size: unit.map(|u| u.size).unwrap_or_default(),
            quantity: line.quantity,
            price: line.price,
            line_total: line.price.multiply(line.quantity),
            status: line.status,
            return_requested: line.return_requested,
            return_status: line.return_status.clone(),
        });
    }

    Ok(OrderView {
        order_id: order.id,
        order_status: order.order_status,
        total_amount: order.total_amount,
        delivery_charge: order.shipping.delivery_charge,
        sub_total,
        created_at: order.created_at,
        lines,
    })
}
