use async_trait::async_trait;

use common::{AddressId, CartId, OrderId, ProductId, SizeVariantId, UserId, VariantId};

use crate::model::{Address, Cart, Coupon, InventoryUnit, Order, Product, Variant};
use crate::Result;

/// A session, boxed for use behind the [`CheckoutStore`] trait object seam.
pub type BoxedSession = Box<dyn StoreSession>;

/// Core trait for checkout store implementations.
///
/// Plain methods are single reads (or, for `save_order`, a single
/// standalone write). Anything that must be atomic across documents goes
/// through a [`StoreSession`] obtained from [`begin`](Self::begin).
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Starts a new transactional session.
    ///
    /// Every write made through the session becomes visible atomically on
    /// [`commit`](StoreSession::commit) or not at all.
    async fn begin(&self) -> Result<BoxedSession>;

    /// Loads an inventory unit by id.
    async fn inventory_unit(&self, id: SizeVariantId) -> Result<Option<InventoryUnit>>;

    /// Loads a cart by id.
    async fn cart(&self, id: CartId) -> Result<Option<Cart>>;

    /// Loads an address by id.
    async fn address(&self, id: AddressId) -> Result<Option<Address>>;

    /// Looks up a coupon by its code.
    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>>;

    /// Loads a catalog product display record.
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads a catalog variant display record.
    async fn variant(&self, id: VariantId) -> Result<Option<Variant>>;

    /// Loads an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order only if it belongs to the given user.
    async fn order_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>>;

    /// Returns all orders of a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Overwrites an existing order outside any session.
    ///
    /// Used by flows that touch no stock (return requests); stock-mutating
    /// flows must go through a session instead.
    async fn save_order(&self, order: &Order) -> Result<()>;
}

/// One atomic unit of work against the store.
///
/// A session is consumed by [`commit`](Self::commit) or
/// [`abort`](Self::abort); dropping it without committing discards every
/// staged write. Callers are responsible for calling `reserve`/`release`
/// at most once per order line.
#[async_trait]
pub trait StoreSession: Send {
    /// Atomically checks and decrements stock for a unit.
    ///
    /// Fails with [`StoreError::InsufficientStock`](crate::StoreError::InsufficientStock)
    /// when `quantity` exceeds the current count — there is no gap between
    /// the check and the decrement, which is what prevents oversell under
    /// concurrent checkouts. Recomputes `in_stock` and returns the updated
    /// unit (its price fields are used for snapshotting).
    async fn reserve(&mut self, unit_id: SizeVariantId, quantity: u32) -> Result<InventoryUnit>;

    /// Increments stock for a unit and recomputes `in_stock`.
    async fn release(&mut self, unit_id: SizeVariantId, quantity: u32) -> Result<()>;

    /// Loads an order with a write lock held for the rest of the session.
    async fn load_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Stages a new order for insertion.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Stages an update of an existing order.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Empties a cart's line collection, keeping the cart itself.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<()>;

    /// Appends `user_id` to a coupon's `used_by` set, once.
    ///
    /// A no-op when the coupon does not exist or already records the user.
    async fn mark_coupon_used(&mut self, code: &str, user_id: UserId) -> Result<()>;

    /// Commits every staged write atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged write.
    async fn abort(self: Box<Self>) -> Result<()>;
}
