//! The checkout orchestrator.

use chrono::Utc;

use common::{ItemStatus, Money, OrderId, OrderItemId, OrderStatus, UserId};
use store::{BoxedSession, CheckoutStore, Order, OrderLine, Payment, Shipping, StoreSession};

use crate::error::CheckoutError;

use super::{CheckoutLine, CheckoutRequest, CheckoutSource};

/// Orders below this total pay the flat delivery charge.
pub const FREE_DELIVERY_THRESHOLD: Money = Money::from_minor(1000);

/// Flat delivery charge for small orders.
pub const DELIVERY_CHARGE: Money = Money::from_minor(40);

/// Computes the delivery charge for a given order total.
pub fn delivery_charge(final_total: Money) -> Money {
    if final_total < FREE_DELIVERY_THRESHOLD {
        DELIVERY_CHARGE
    } else {
        Money::zero()
    }
}

/// Converts a cart or direct-purchase payload into a persisted order while
/// reserving stock, all inside one store session.
///
/// Any failure after the session opens aborts it, so a checkout either
/// commits completely (stock decremented, order inserted, cart cleared,
/// coupon marked) or leaves the store untouched.
pub struct CheckoutService<S: CheckoutStore> {
    store: S,
}

impl<S: CheckoutStore> CheckoutService<S> {
    /// Creates a new checkout service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order from the given checkout request.
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_checkout(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        request.validate()?;

        // Resolve the lines to purchase. Cart and address lookups are
        // plain reads and fail fast before any session is opened.
        let (lines, cart_to_clear) = match &request.source {
            CheckoutSource::Cart { cart_id } => {
                let cart = self
                    .store
                    .cart(*cart_id)
                    .await?
                    .ok_or(CheckoutError::NotFound("Cart"))?;
                if cart.lines.is_empty() {
                    return Err(CheckoutError::Validation("Cart is empty".to_string()));
                }
                let lines: Vec<CheckoutLine> =
                    cart.lines.into_iter().map(CheckoutLine::from).collect();
                (lines, Some(*cart_id))
            }
            CheckoutSource::Direct { items } => (items.clone(), None),
        };

        // Validation order: inventory before address. This read is only a
        // classifier for the failure response; the session reserve below
        // re-checks authoritatively under the transaction.
        for line in &lines {
            let unit = self
                .store
                .inventory_unit(line.size_variant_id)
                .await?
                .ok_or(CheckoutError::NotFound("Size variant"))?;
            if line.quantity > unit.stock_count {
                metrics::counter!("checkout_insufficient_stock_total").increment(1);
                return Err(CheckoutError::InsufficientStock {
                    requested: line.quantity,
                    available: unit.stock_count,
                });
            }
        }

        self.store
            .address(request.address_id)
            .await?
            .ok_or(CheckoutError::NotFound("Address"))?;

        // Coupon usage is a checkout side effect, not a stock invariant:
        // unknown codes and already-recorded users are silently skipped.
        let coupon_to_mark = match &request.coupon_code {
            Some(code) => self
                .store
                .coupon_by_code(code)
                .await?
                .filter(|c| !c.used_by.contains(&user_id))
                .map(|c| c.code),
            None => None,
        };

        let mut session = self.store.begin().await?;
        let staged = Self::stage_checkout(
            &mut session,
            user_id,
            &request,
            &lines,
            cart_to_clear,
            coupon_to_mark.as_deref(),
        )
        .await;

        match staged {
            Ok(order) => {
                session.commit().await?;
                metrics::counter!("checkout_orders_created_total").increment(1);
                tracing::info!(order_id = %order.id, lines = order.lines.len(), "checkout committed");
                Ok(order)
            }
            Err(err) => {
                // Abort before surfacing so no partial stock decrement or
                // order write is ever visible.
                session.abort().await?;
                if matches!(err, CheckoutError::InsufficientStock { .. }) {
                    metrics::counter!("checkout_insufficient_stock_total").increment(1);
                }
                Err(err)
            }
        }
    }

    async fn stage_checkout(
        session: &mut BoxedSession,
        user_id: UserId,
        request: &CheckoutRequest,
        lines: &[CheckoutLine],
        cart_to_clear: Option<common::CartId>,
        coupon_to_mark: Option<&str>,
    ) -> Result<Order, CheckoutError> {
        let mut order_lines = Vec::with_capacity(lines.len());
        for line in lines {
            // Reservation is validated per line; one short line aborts
            // the whole checkout.
            let unit = session.reserve(line.size_variant_id, line.quantity).await?;

            order_lines.push(OrderLine {
                id: OrderItemId::new(),
                product_id: line.product_id,
                variant_id: line.variant_id,
                size_variant_id: line.size_variant_id,
                quantity: line.quantity,
                price: unit.price,
                final_price: unit.final_price(),
                status: ItemStatus::Pending,
                return_requested: false,
                return_reason: None,
                return_details: None,
                return_status: None,
                cancellation_reason: None,
            });
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            user_id,
            lines: order_lines,
            shipping: Shipping {
                address_id: request.address_id,
                method: request.shipping_method.clone(),
                delivery_charge: delivery_charge(request.final_total),
            },
            payment: Payment {
                method: request.payment_method.clone(),
                status: request.payment_status.clone(),
                transaction_id: request.transaction_id.clone(),
                amount: request.final_total,
                paid_at: now,
            },
            order_status: OrderStatus::Pending,
            total_amount: request.final_total,
            coupon_code: request.coupon_code.clone(),
            coupon_discount: request.discount_amount,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        session.insert_order(&order).await?;

        if let Some(cart_id) = cart_to_clear {
            session.clear_cart(cart_id).await?;
        }
        if let Some(code) = coupon_to_mark {
            session.mark_coupon_used(code, user_id).await?;
        }

        Ok(order)
    }
}
