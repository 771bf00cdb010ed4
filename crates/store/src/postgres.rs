use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use common::{AddressId, CartId, Money, OrderId, ProductId, SizeVariantId, UserId, VariantId};

use crate::model::{Address, Cart, CartLine, Coupon, InventoryUnit, Order, Product, Variant};
use crate::store::{BoxedSession, CheckoutStore, StoreSession};
use crate::{Result, StoreError};

/// PostgreSQL-backed checkout store.
///
/// Orders are stored as documents (JSONB) with their lines embedded, the
/// way the upstream storefront persisted them; inventory units are plain
/// rows so that reservation can be a single conditional UPDATE with no
/// read-then-write window.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL checkout store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and creates a store.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_unit(row: PgRow) -> Result<InventoryUnit> {
        let stock_count: i32 = row.try_get("stock_count")?;
        Ok(InventoryUnit {
            id: SizeVariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            size: row.try_get("size")?,
            price: Money::from_minor(row.try_get("price")?),
            discount_price: row
                .try_get::<Option<i64>, _>("discount_price")?
                .map(Money::from_minor),
            stock_count: stock_count.max(0) as u32,
            in_stock: row.try_get("in_stock")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }
}

const UNIT_COLUMNS: &str =
    "id, product_id, variant_id, size, price, discount_price, stock_count, in_stock";

#[async_trait]
impl CheckoutStore for PostgresStore {
    async fn begin(&self) -> Result<BoxedSession> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }

    async fn inventory_unit(&self, id: SizeVariantId) -> Result<Option<InventoryUnit>> {
        let row =
            sqlx::query(&format!("SELECT {UNIT_COLUMNS} FROM inventory_units WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_unit).transpose()
    }

    async fn cart(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT id, user_id, lines FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let lines: Vec<CartLine> =
                    serde_json::from_value(row.try_get::<serde_json::Value, _>("lines")?)?;
                Ok(Some(Cart {
                    id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                    lines,
                }))
            }
            None => Ok(None),
        }
    }

    async fn address(&self, id: AddressId) -> Result<Option<Address>> {
        let row = sqlx::query("SELECT doc FROM addresses WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("doc")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query("SELECT code, discount, used_by FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Coupon {
                code: row.try_get("code")?,
                discount: Money::from_minor(row.try_get("discount")?),
                used_by: row
                    .try_get::<Vec<Uuid>, _>("used_by")?
                    .into_iter()
                    .map(UserId::from_uuid)
                    .collect(),
            })),
            None => Ok(None),
        }
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, image_url FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Product {
                id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
                image_url: row.try_get("image_url")?,
            })),
            None => Ok(None),
        }
    }

    async fn variant(&self, id: VariantId) -> Result<Option<Variant>> {
        let row = sqlx::query("SELECT id, product_id, color FROM variants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Variant {
                id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
                product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                color: row.try_get("color")?,
            })),
            None => Ok(None),
        }
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn order_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows =
            sqlx::query("SELECT doc FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let doc = serde_json::to_value(order)?;
        sqlx::query("UPDATE orders SET doc = $2 WHERE id = $1")
            .bind(order.id.as_uuid())
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn reserve(&mut self, unit_id: SizeVariantId, quantity: u32) -> Result<InventoryUnit> {
        // Check and decrement in one statement: a concurrent transaction
        // sees either the pre-decrement or post-decrement row, never an
        // interleaved read-then-write. The quantity is bound as BIGINT so
        // a u32 above i32::MAX cannot wrap negative and pass the guard.
        let row = sqlx::query(&format!(
            "UPDATE inventory_units \
             SET stock_count = stock_count - $2, in_stock = stock_count - $2 > 0 \
             WHERE id = $1 AND stock_count >= $2 \
             RETURNING {UNIT_COLUMNS}"
        ))
        .bind(unit_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(row) = row {
            return PostgresStore::row_to_unit(row);
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT stock_count FROM inventory_units WHERE id = $1")
                .bind(unit_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                unit_id,
                requested: quantity,
                available: available.max(0) as u32,
            }),
            None => Err(StoreError::UnitNotFound(unit_id)),
        }
    }

    async fn release(&mut self, unit_id: SizeVariantId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE inventory_units \
             SET stock_count = stock_count + $2, in_stock = stock_count + $2 > 0 \
             WHERE id = $1",
        )
        .bind(unit_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnitNotFound(unit_id));
        }
        Ok(())
    }

    async fn load_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        // Row lock held until commit/rollback so concurrent cancellations
        // of the same order serialize.
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(PostgresStore::row_to_order).transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let doc = serde_json::to_value(order)?;
        sqlx::query("INSERT INTO orders (id, user_id, created_at, doc) VALUES ($1, $2, $3, $4)")
            .bind(order.id.as_uuid())
            .bind(order.user_id.as_uuid())
            .bind(order.created_at)
            .bind(doc)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let doc = serde_json::to_value(order)?;
        sqlx::query("UPDATE orders SET doc = $2 WHERE id = $1")
            .bind(order.id.as_uuid())
            .bind(doc)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<()> {
        sqlx::query("UPDATE carts SET lines = '[]'::jsonb WHERE id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn mark_coupon_used(&mut self, code: &str, user_id: UserId) -> Result<()> {
        sqlx::query(
            "UPDATE coupons SET used_by = array_append(used_by, $2) \
             WHERE code = $1 AND NOT ($2 = ANY(used_by))",
        )
        .bind(code)
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
