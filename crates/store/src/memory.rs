use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use common::{AddressId, CartId, OrderId, ProductId, SizeVariantId, UserId, VariantId};

use crate::model::{Address, Cart, Coupon, InventoryUnit, Order, Product, Variant};
use crate::store::{BoxedSession, CheckoutStore, StoreSession};
use crate::{Result, StoreError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    units: HashMap<SizeVariantId, InventoryUnit>,
    carts: HashMap<CartId, Cart>,
    addresses: HashMap<AddressId, Address>,
    coupons: HashMap<String, Coupon>,
    products: HashMap<ProductId, Product>,
    variants: HashMap<VariantId, Variant>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory checkout store for tests and development.
///
/// Sessions are serialized on a single mutex and mutate a working copy of
/// the state that is only published on commit, so a session either commits
/// fully or leaves no trace — the same contract as the PostgreSQL
/// implementation. Store-level reads block while a session is open.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an inventory unit.
    pub async fn put_inventory_unit(&self, unit: InventoryUnit) {
        self.state.lock().await.units.insert(unit.id, unit);
    }

    /// Seeds a cart.
    pub async fn put_cart(&self, cart: Cart) {
        self.state.lock().await.carts.insert(cart.id, cart);
    }

    /// Seeds an address.
    pub async fn put_address(&self, address: Address) {
        self.state.lock().await.addresses.insert(address.id, address);
    }

    /// Seeds a coupon.
    pub async fn put_coupon(&self, coupon: Coupon) {
        self.state
            .lock()
            .await
            .coupons
            .insert(coupon.code.clone(), coupon);
    }

    /// Seeds a catalog product record.
    pub async fn put_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    /// Seeds a catalog variant record.
    pub async fn put_variant(&self, variant: Variant) {
        self.state.lock().await.variants.insert(variant.id, variant);
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl CheckoutStore for InMemoryStore {
    async fn begin(&self) -> Result<BoxedSession> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySession { guard, working }))
    }

    async fn inventory_unit(&self, id: SizeVariantId) -> Result<Option<InventoryUnit>> {
        Ok(self.state.lock().await.units.get(&id).cloned())
    }

    async fn cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.state.lock().await.carts.get(&id).cloned())
    }

    async fn address(&self, id: AddressId) -> Result<Option<Address>> {
        Ok(self.state.lock().await.addresses.get(&id).cloned())
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.state.lock().await.coupons.get(code).cloned())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn variant(&self, id: VariantId) -> Result<Option<Variant>> {
        Ok(self.state.lock().await.variants.get(&id).cloned())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn order_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .get(&id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        self.state
            .lock()
            .await
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn reserve(&mut self, unit_id: SizeVariantId, quantity: u32) -> Result<InventoryUnit> {
        let unit = self
            .working
            .units
            .get_mut(&unit_id)
            .ok_or(StoreError::UnitNotFound(unit_id))?;

        if unit.stock_count < quantity {
            return Err(StoreError::InsufficientStock {
                unit_id,
                requested: quantity,
                available: unit.stock_count,
            });
        }

        unit.stock_count -= quantity;
        unit.in_stock = unit.stock_count > 0;
        Ok(unit.clone())
    }

    async fn release(&mut self, unit_id: SizeVariantId, quantity: u32) -> Result<()> {
        let unit = self
            .working
            .units
            .get_mut(&unit_id)
            .ok_or(StoreError::UnitNotFound(unit_id))?;

        unit.stock_count += quantity;
        unit.in_stock = unit.stock_count > 0;
        Ok(())
    }

    async fn load_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        // The session already holds the store mutex, so the order cannot
        // change underneath us before commit.
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<()> {
        if let Some(cart) = self.working.carts.get_mut(&cart_id) {
            cart.lines.clear();
        }
        Ok(())
    }

    async fn mark_coupon_used(&mut self, code: &str, user_id: UserId) -> Result<()> {
        if let Some(coupon) = self.working.coupons.get_mut(code)
            && !coupon.used_by.contains(&user_id)
        {
            coupon.used_by.push(user_id);
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        *self.guard = self.working;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        // Dropping the session discards the working copy.
        Ok(())
    }
}
