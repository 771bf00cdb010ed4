//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{
    AddressId, CartId, ItemStatus, Money, OrderId, OrderItemId, OrderStatus, ProductId,
    SizeVariantId, UserId, VariantId,
};
use sqlx::PgPool;
use store::{
    Cart, CartLine, CheckoutStore, Coupon, InventoryUnit, Order, OrderLine, Payment,
    PostgresStore, Shipping, StoreError, StoreSession,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!("../../../migrations/0001_checkout.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE inventory_units, carts, addresses, coupons, products, variants, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn test_unit(stock: u32, price: i64, discount: Option<i64>) -> InventoryUnit {
    InventoryUnit {
        id: SizeVariantId::new(),
        product_id: ProductId::new(),
        variant_id: VariantId::new(),
        size: "M".to_string(),
        price: Money::from_minor(price),
        discount_price: discount.map(Money::from_minor),
        stock_count: stock,
        in_stock: stock > 0,
    }
}

async fn insert_unit(store: &PostgresStore, unit: &InventoryUnit) {
    sqlx::query(
        "INSERT INTO inventory_units \
         (id, product_id, variant_id, size, price, discount_price, stock_count, in_stock) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(unit.id.as_uuid())
    .bind(unit.product_id.as_uuid())
    .bind(unit.variant_id.as_uuid())
    .bind(&unit.size)
    .bind(unit.price.minor())
    .bind(unit.discount_price.map(|m| m.minor()))
    .bind(unit.stock_count as i32)
    .bind(unit.in_stock)
    .execute(store.pool())
    .await
    .unwrap();
}

async fn insert_cart(store: &PostgresStore, cart: &Cart) {
    sqlx::query("INSERT INTO carts (id, user_id, lines) VALUES ($1, $2, $3)")
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.as_uuid())
        .bind(serde_json::to_value(&cart.lines).unwrap())
        .execute(store.pool())
        .await
        .unwrap();
}

async fn insert_coupon(store: &PostgresStore, coupon: &Coupon) {
    let used_by: Vec<uuid::Uuid> = coupon.used_by.iter().map(|u| u.as_uuid()).collect();
    sqlx::query("INSERT INTO coupons (code, discount, used_by) VALUES ($1, $2, $3)")
        .bind(&coupon.code)
        .bind(coupon.discount.minor())
        .bind(used_by)
        .execute(store.pool())
        .await
        .unwrap();
}

fn test_order(user_id: UserId, lines: Vec<OrderLine>) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(),
        user_id,
        lines,
        shipping: Shipping {
            address_id: AddressId::new(),
            method: "standard".to_string(),
            delivery_charge: Money::from_minor(40),
        },
        payment: Payment {
            method: "card".to_string(),
            status: "paid".to_string(),
            transaction_id: "TXN-1".to_string(),
            amount: Money::from_minor(160),
            paid_at: now,
        },
        order_status: OrderStatus::Pending,
        total_amount: Money::from_minor(160),
        coupon_code: None,
        coupon_discount: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    }
}

fn test_line(unit: &InventoryUnit, quantity: u32) -> OrderLine {
    OrderLine {
        id: OrderItemId::new(),
        product_id: unit.product_id,
        variant_id: unit.variant_id,
        size_variant_id: unit.id,
        quantity,
        price: unit.price,
        final_price: unit.final_price(),
        status: ItemStatus::Pending,
        return_requested: false,
        return_reason: None,
        return_details: None,
        return_status: None,
        cancellation_reason: None,
    }
}

#[tokio::test]
async fn reserve_decrements_stock_and_commits() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, Some(80));
    insert_unit(&store, &unit).await;

    let mut session = store.begin().await.unwrap();
    let reserved = session.reserve(unit.id, 2).await.unwrap();
    assert_eq!(reserved.stock_count, 3);
    assert!(reserved.in_stock);
    assert_eq!(reserved.final_price(), Money::from_minor(80));
    session.commit().await.unwrap();

    let stored = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_count, 3);
}

#[tokio::test]
async fn reserve_to_zero_clears_in_stock() {
    let store = get_test_store().await;
    let unit = test_unit(2, 100, None);
    insert_unit(&store, &unit).await;

    let mut session = store.begin().await.unwrap();
    let reserved = session.reserve(unit.id, 2).await.unwrap();
    assert_eq!(reserved.stock_count, 0);
    assert!(!reserved.in_stock);
    session.commit().await.unwrap();
}

#[tokio::test]
async fn reserve_more_than_available_fails_with_count() {
    let store = get_test_store().await;
    let unit = test_unit(1, 100, None);
    insert_unit(&store, &unit).await;

    let mut session = store.begin().await.unwrap();
    let err = session.reserve(unit.id, 2).await.unwrap_err();
    match err {
        StoreError::InsufficientStock {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    session.abort().await.unwrap();

    let stored = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_count, 1);
}

#[tokio::test]
async fn reserve_quantity_wider_than_i32_fails_without_mutation() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, None);
    insert_unit(&store, &unit).await;

    // u32::MAX reinterpreted as a 32-bit signed value would be -1, which
    // would pass the stock guard and *increment* the count. The quantity
    // is bound as BIGINT so it must fail like any other short reservation.
    let mut session = store.begin().await.unwrap();
    let err = session.reserve(unit.id, u32::MAX).await.unwrap_err();
    match err {
        StoreError::InsufficientStock {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, u32::MAX);
            assert_eq!(available, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    session.abort().await.unwrap();

    let stored = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_count, 5);
    assert!(stored.in_stock);
}

#[tokio::test]
async fn reserve_unknown_unit_is_not_found() {
    let store = get_test_store().await;

    let mut session = store.begin().await.unwrap();
    let err = session.reserve(SizeVariantId::new(), 1).await.unwrap_err();
    assert!(matches!(err, StoreError::UnitNotFound(_)));
    session.abort().await.unwrap();
}

#[tokio::test]
async fn abort_rolls_back_reservation_and_order() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, None);
    insert_unit(&store, &unit).await;
    let user_id = UserId::new();

    let mut session = store.begin().await.unwrap();
    session.reserve(unit.id, 3).await.unwrap();
    let order = test_order(user_id, vec![test_line(&unit, 3)]);
    session.insert_order(&order).await.unwrap();
    session.abort().await.unwrap();

    let stored = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_count, 5);
    assert!(store.order(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn order_document_roundtrips_through_jsonb() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, Some(80));
    insert_unit(&store, &unit).await;
    let user_id = UserId::new();
    let order = test_order(user_id, vec![test_line(&unit, 2)]);

    let mut session = store.begin().await.unwrap();
    session.insert_order(&order).await.unwrap();
    session.commit().await.unwrap();

    let stored = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored, order);
}

#[tokio::test]
async fn release_restores_stock() {
    let store = get_test_store().await;
    let mut unit = test_unit(0, 100, None);
    unit.in_stock = false;
    insert_unit(&store, &unit).await;

    let mut session = store.begin().await.unwrap();
    session.release(unit.id, 2).await.unwrap();
    session.commit().await.unwrap();

    let stored = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_count, 2);
    assert!(stored.in_stock);
}

#[tokio::test]
async fn clear_cart_keeps_the_cart_row() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, None);
    let cart = Cart {
        id: CartId::new(),
        user_id: UserId::new(),
        lines: vec![CartLine {
            product_id: unit.product_id,
            variant_id: unit.variant_id,
            size_variant_id: unit.id,
            quantity: 2,
        }],
    };
    insert_cart(&store, &cart).await;

    let mut session = store.begin().await.unwrap();
    session.clear_cart(cart.id).await.unwrap();
    session.commit().await.unwrap();

    let stored = store.cart(cart.id).await.unwrap().unwrap();
    assert!(stored.lines.is_empty());
    assert_eq!(stored.user_id, cart.user_id);
}

#[tokio::test]
async fn mark_coupon_used_appends_once() {
    let store = get_test_store().await;
    let coupon = Coupon {
        code: "SAVE10".to_string(),
        discount: Money::from_minor(10),
        used_by: vec![],
    };
    insert_coupon(&store, &coupon).await;
    let user = UserId::new();

    let mut session = store.begin().await.unwrap();
    session.mark_coupon_used("SAVE10", user).await.unwrap();
    session.mark_coupon_used("SAVE10", user).await.unwrap();
    session.commit().await.unwrap();

    let stored = store.coupon_by_code("SAVE10").await.unwrap().unwrap();
    assert_eq!(stored.used_by, vec![user]);
}

#[tokio::test]
async fn orders_for_user_is_newest_first_and_scoped() {
    let store = get_test_store().await;
    let unit = test_unit(10, 100, None);
    insert_unit(&store, &unit).await;
    let user_id = UserId::new();
    let other_user = UserId::new();

    let mut older = test_order(user_id, vec![test_line(&unit, 1)]);
    older.created_at = Utc::now() - chrono::Duration::hours(1);
    let newer = test_order(user_id, vec![test_line(&unit, 1)]);
    let foreign = test_order(other_user, vec![test_line(&unit, 1)]);

    let mut session = store.begin().await.unwrap();
    session.insert_order(&older).await.unwrap();
    session.insert_order(&newer).await.unwrap();
    session.insert_order(&foreign).await.unwrap();
    session.commit().await.unwrap();

    let orders = store.orders_for_user(user_id).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, newer.id);
    assert_eq!(orders[1].id, older.id);

    assert!(
        store
            .order_for_user(foreign.id, user_id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn update_order_inside_session() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, None);
    insert_unit(&store, &unit).await;
    let order = test_order(UserId::new(), vec![test_line(&unit, 1)]);

    let mut session = store.begin().await.unwrap();
    session.insert_order(&order).await.unwrap();
    session.commit().await.unwrap();

    let mut session = store.begin().await.unwrap();
    let mut loaded = session.load_order(order.id).await.unwrap().unwrap();
    loaded.lines[0].status = ItemStatus::Cancelled;
    loaded.order_status = OrderStatus::Cancelled;
    session.update_order(&loaded).await.unwrap();
    session.commit().await.unwrap();

    let stored = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_status, OrderStatus::Cancelled);
    assert_eq!(stored.lines[0].status, ItemStatus::Cancelled);
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let store = get_test_store().await;
    let unit = test_unit(5, 100, None);
    insert_unit(&store, &unit).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let unit_id = unit.id;
        handles.push(tokio::spawn(async move {
            let mut session = store.begin().await.unwrap();
            match session.reserve(unit_id, 1).await {
                Ok(_) => {
                    session.commit().await.unwrap();
                    true
                }
                Err(_) => {
                    session.abort().await.unwrap();
                    false
                }
            }
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 5);
    let stored = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(stored.stock_count, 0);
    assert!(!stored.in_stock);
}
