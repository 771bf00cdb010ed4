//! Checkout input types.
//!
//! The HTTP layer accepts two body shapes under one endpoint (cart-based
//! and "buy now" direct purchase); here they are a tagged union so the
//! orchestrator core never branches on loosely-typed payloads.

use common::{AddressId, CartId, Money, ProductId, SizeVariantId, VariantId};
use store::CartLine;

use crate::error::CheckoutError;

/// One line to purchase, common to both checkout shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub size_variant_id: SizeVariantId,
    pub quantity: u32,
}

impl From<CartLine> for CheckoutLine {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id,
            variant_id: line.variant_id,
            size_variant_id: line.size_variant_id,
            quantity: line.quantity,
        }
    }
}

/// Where the purchased lines come from.
#[derive(Debug, Clone)]
pub enum CheckoutSource {
    /// Consume and clear the user's cart.
    Cart { cart_id: CartId },
    /// "Buy now": lines supplied directly, cart untouched.
    Direct { items: Vec<CheckoutLine> },
}

/// A fully-typed checkout request.
///
/// Field presence is enforced at the HTTP boundary; `validate` covers the
/// remaining shape rules that types alone cannot express.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub source: CheckoutSource,
    pub address_id: AddressId,
    pub shipping_method: String,
    pub payment_method: String,
    pub transaction_id: String,
    pub payment_status: String,
    /// Client-supplied grand total, trusted as-is for the delivery-charge
    /// tier and recorded as the order total (source-compatible behavior).
    pub final_total: Money,
    pub coupon_code: Option<String>,
    pub discount_amount: Option<Money>,
}

impl CheckoutRequest {
    /// Validates shape rules: direct purchases need at least one line and
    /// every quantity must be positive.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if let CheckoutSource::Direct { items } = &self.source {
            if items.is_empty() {
                return Err(CheckoutError::Validation(
                    "No items provided for direct purchase".to_string(),
                ));
            }
            if items.iter().any(|i| i.quantity == 0) {
                return Err(CheckoutError::Validation(
                    "Item quantity must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}
