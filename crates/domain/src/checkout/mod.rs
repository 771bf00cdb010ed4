//! Checkout orchestration: request shapes and the orchestrator service.

mod request;
mod service;

pub use request::{CheckoutLine, CheckoutRequest, CheckoutSource};
pub use service::{delivery_charge, CheckoutService, DELIVERY_CHARGE, FREE_DELIVERY_THRESHOLD};
