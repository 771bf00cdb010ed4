//! Persistence layer for the checkout engine.
//!
//! Defines the persisted record types, the [`CheckoutStore`] /
//! [`StoreSession`] traits (a session is one atomic transaction), and two
//! implementations: [`InMemoryStore`] for tests and development, and
//! [`PostgresStore`] backed by sqlx transactions.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Address, Cart, CartLine, Coupon, InventoryUnit, Order, OrderLine, Payment, Product, Shipping,
    Variant,
};
pub use postgres::PostgresStore;
pub use store::{BoxedSession, CheckoutStore, StoreSession};
