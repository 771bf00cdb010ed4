//! Post-checkout order lifecycle: cancellations, return requests, and the
//! order history listing.

use chrono::Utc;

use common::{ItemStatus, OrderId, OrderItemId, OrderStatus, UserId, RETURN_PENDING};
use store::{BoxedSession, CheckoutStore, Order, StoreSession};

use crate::error::CheckoutError;
use crate::view::{project_order, OrderView};

/// Manages orders after checkout has committed them.
///
/// Cancellation restores stock, so it runs inside a store session; return
/// requests only annotate the order document and write directly.
pub struct OrderLifecycleService<S: CheckoutStore> {
    store: S,
}

impl<S: CheckoutStore> OrderLifecycleService<S> {
    /// Creates a new lifecycle service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cancels one line of an order and restores its reserved stock.
    ///
    /// Idempotent: cancelling an already-cancelled line changes nothing and
    /// restores no stock a second time. When the last active line is
    /// cancelled the order itself flips to cancelled.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_item(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        reason: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let mut session = self.store.begin().await?;
        let staged = Self::stage_cancel(&mut session, order_id, item_id, reason).await;

        match staged {
            Ok(order) => {
                session.commit().await?;
                metrics::counter!("order_items_cancelled_total").increment(1);
                tracing::info!(%order_id, %item_id, "order item cancelled");
                Ok(order)
            }
            Err(err) => {
                session.abort().await?;
                Err(err)
            }
        }
    }

    async fn stage_cancel(
        session: &mut BoxedSession,
        order_id: OrderId,
        item_id: OrderItemId,
        reason: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let mut order = session
            .load_order(order_id)
            .await?
            .ok_or(CheckoutError::NotFound("Order"))?;

        let line = order
            .line_mut(item_id)
            .ok_or(CheckoutError::NotFound("Order item"))?;

        // An already-cancelled line must not restore stock a second time.
        let restore = line
            .status
            .needs_stock_restore_on_cancel()
            .then(|| (line.size_variant_id, line.quantity));

        line.status = ItemStatus::Cancelled;
        if line.cancellation_reason.is_none() {
            line.cancellation_reason = reason.clone();
        }

        if let Some((unit_id, quantity)) = restore {
            session.release(unit_id, quantity).await?;
        }

        if order.all_lines_cancelled() && order.order_status != OrderStatus::Cancelled {
            order.order_status = OrderStatus::Cancelled;
            if order.cancellation_reason.is_none() {
                order.cancellation_reason = reason;
            }
        }

        order.updated_at = Utc::now();
        session.update_order(&order).await?;
        Ok(order)
    }

    /// Flags a delivered line for return.
    ///
    /// Writes the order document directly, with no session: no stock moves
    /// until the return is physically received and processed elsewhere.
    #[tracing::instrument(skip(self, reason, details))]
    pub async fn return_product(
        &self,
        user_id: UserId,
        order_id: OrderId,
        item_id: OrderItemId,
        reason: String,
        details: String,
    ) -> Result<Order, CheckoutError> {
        let reason = reason.trim().to_string();
        let details = details.trim().to_string();
        if reason.is_empty() {
            return Err(CheckoutError::Validation(
                "Return reason is required".to_string(),
            ));
        }
        if details.is_empty() {
            return Err(CheckoutError::Validation(
                "Return details are required".to_string(),
            ));
        }

        let mut order = self
            .store
            .order_for_user(order_id, user_id)
            .await?
            .ok_or(CheckoutError::NotFound("Order"))?;

        let line = order
            .line_mut(item_id)
            .ok_or(CheckoutError::NotFound("Order item"))?;

        if !line.status.can_request_return() {
            return Err(CheckoutError::InvalidState(
                "Only delivered items can be returned".to_string(),
            ));
        }
        if line.return_requested {
            return Err(CheckoutError::Conflict(
                "Return already requested for this item".to_string(),
            ));
        }

        line.return_requested = true;
        line.return_reason = Some(reason);
        line.return_details = Some(details);
        line.return_status = Some(RETURN_PENDING.to_string());
        order.updated_at = Utc::now();

        self.store.save_order(&order).await?;
        metrics::counter!("order_return_requests_total").increment(1);
        tracing::info!(%order_id, %item_id, "return requested");
        Ok(order)
    }

    /// Lists a user's orders, newest first, projected for display.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderView>, CheckoutError> {
        let orders = self.store.orders_for_user(user_id).await?;
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(project_order(&self.store, order).await?);
        }
        Ok(views)
    }
}
