//! Persisted record types.
//!
//! Orders embed their lines (no separately addressable line collection);
//! inventory units are independently addressable and shared between cart
//! and order lines. Wire/JSONB field names are camelCase for compatibility
//! with the upstream storefront documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{
    AddressId, CartId, ItemStatus, Money, OrderId, OrderItemId, OrderStatus, ProductId,
    SizeVariantId, UserId, VariantId,
};

/// Authoritative stock record for one product+color+size combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUnit {
    pub id: SizeVariantId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub size: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    /// Never negative; the floor is enforced by `reserve`.
    pub stock_count: u32,
    /// Always recomputed from `stock_count` on mutation, never trusted
    /// independently.
    pub in_stock: bool,
}

impl InventoryUnit {
    /// The price a buyer actually pays: the discount price when present.
    pub fn final_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}

/// One line of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub size_variant_id: SizeVariantId,
    pub quantity: u32,
}

/// A user's cart. Checkout empties `lines` but keeps the cart itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

/// A shipping address from the user's address book (read-only here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
}

/// A discount coupon. Checkout appends the buyer to `used_by` once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount: Money,
    pub used_by: Vec<UserId>,
}

/// Catalog read record used only for display projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub image_url: String,
}

/// Catalog read record: a product color variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub color: String,
}

/// One purchased item within an order.
///
/// `price` and `final_price` are snapshots taken at checkout; later catalog
/// price changes never touch them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub size_variant_id: SizeVariantId,
    pub quantity: u32,
    pub price: Money,
    pub final_price: Money,
    pub status: ItemStatus,
    #[serde(default)]
    pub return_requested: bool,
    #[serde(default)]
    pub return_reason: Option<String>,
    #[serde(default)]
    pub return_details: Option<String>,
    #[serde(default)]
    pub return_status: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

/// Shipping block of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
    pub address_id: AddressId,
    pub method: String,
    pub delivery_charge: Money,
}

/// Payment block of an order, recorded from the gateway at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: String,
    pub status: String,
    pub transaction_id: String,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// An order: immutable once placed, mutated only through the lifecycle
/// manager. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping: Shipping,
    pub payment: Payment,
    pub order_status: OrderStatus,
    pub total_amount: Money,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub coupon_discount: Option<Money>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Finds a line by its item id.
    pub fn line(&self, item_id: OrderItemId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == item_id)
    }

    /// Finds a line by its item id, mutably.
    pub fn line_mut(&mut self, item_id: OrderItemId) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.id == item_id)
    }

    /// True when every line has been cancelled.
    pub fn all_lines_cancelled(&self) -> bool {
        self.lines.iter().all(|l| l.status == ItemStatus::Cancelled)
    }

    /// Sum of `price × quantity` over all lines.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(|l| l.price.multiply(l.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(status: ItemStatus, price: i64, quantity: u32) -> OrderLine {
        OrderLine {
            id: OrderItemId::new(),
            product_id: ProductId::new(),
            variant_id: VariantId::new(),
            size_variant_id: SizeVariantId::new(),
            quantity,
            price: Money::from_minor(price),
            final_price: Money::from_minor(price),
            status,
            return_requested: false,
            return_reason: None,
            return_details: None,
            return_status: None,
            cancellation_reason: None,
        }
    }

    fn order(lines: Vec<OrderLine>) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            user_id: UserId::new(),
            lines,
            shipping: Shipping {
                address_id: AddressId::new(),
                method: "standard".to_string(),
                delivery_charge: Money::from_minor(40),
            },
            payment: Payment {
                method: "card".to_string(),
                status: "paid".to_string(),
                transaction_id: "TXN-1".to_string(),
                amount: Money::from_minor(160),
                paid_at: now,
            },
            order_status: OrderStatus::Pending,
            total_amount: Money::from_minor(160),
            coupon_code: None,
            coupon_discount: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn final_price_prefers_discount() {
        let unit = InventoryUnit {
            id: SizeVariantId::new(),
            product_id: ProductId::new(),
            variant_id: VariantId::new(),
            size: "M".to_string(),
            price: Money::from_minor(100),
            discount_price: Some(Money::from_minor(80)),
            stock_count: 5,
            in_stock: true,
        };
        assert_eq!(unit.final_price(), Money::from_minor(80));

        let unit = InventoryUnit {
            discount_price: None,
            ..unit
        };
        assert_eq!(unit.final_price(), Money::from_minor(100));
    }

    #[test]
    fn all_lines_cancelled_requires_every_line() {
        let o = order(vec![
            line(ItemStatus::Cancelled, 100, 1),
            line(ItemStatus::Pending, 100, 1),
        ]);
        assert!(!o.all_lines_cancelled());

        let o = order(vec![
            line(ItemStatus::Cancelled, 100, 1),
            line(ItemStatus::Cancelled, 100, 1),
        ]);
        assert!(o.all_lines_cancelled());
    }

    #[test]
    fn subtotal_is_price_times_quantity() {
        let o = order(vec![
            line(ItemStatus::Pending, 100, 2),
            line(ItemStatus::Pending, 50, 3),
        ]);
        assert_eq!(o.subtotal(), Money::from_minor(350));
    }

    #[test]
    fn order_document_roundtrip() {
        let o = order(vec![line(ItemStatus::Pending, 100, 2)]);
        let doc = serde_json::to_value(&o).unwrap();
        assert_eq!(doc["orderStatus"], "pending");
        assert_eq!(doc["lines"][0]["finalPrice"], 100);

        let back: Order = serde_json::from_value(doc).unwrap();
        assert_eq!(back, o);
    }
}
