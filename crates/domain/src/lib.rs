//! Checkout orchestration and order lifecycle.
//!
//! [`CheckoutService`] turns a cart or direct purchase into a committed
//! order inside one store session; [`OrderLifecycleService`] handles
//! everything after that (cancellation, return requests, history).

pub mod checkout;
pub mod error;
pub mod lifecycle;
pub mod view;

pub use checkout::{
    delivery_charge, CheckoutLine, CheckoutRequest, CheckoutService, CheckoutSource,
    DELIVERY_CHARGE, FREE_DELIVERY_THRESHOLD,
};
pub use error::CheckoutError;
pub use lifecycle::OrderLifecycleService;
pub use view::{project_order, OrderLineView, OrderView};
