//! Shared types for the checkout engine.
//!
//! Identifier newtypes, the `Money` value type, and the order status
//! state machines used by both the persistence and domain layers.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{ItemStatus, OrderStatus, RETURN_PENDING};
pub use types::{
    AddressId, CartId, OrderId, OrderItemId, ProductId, SizeVariantId, UserId, VariantId,
};
