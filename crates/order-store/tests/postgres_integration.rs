//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use domain::{Money, NewOrder, Order, OrderItem, OrderStatus, ShippingAddress, UserId};
use order_store::{OrderId, OrderStore, OrderStoreError, OrderStoreExt, PostgresOrderStore};
use serial_test::serial;
use sqlx::PgPool;
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

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
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
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderStore::new(pool)
}

fn sample_items() -> Vec<OrderItem> {
    vec![
        OrderItem::new("p1", 2, Money::from_cents(1000)),
        OrderItem::new("p2", 1, Money::from_cents(2550)),
    ]
}

async fn persist(store: &PostgresOrderStore, items: Vec<OrderItem>) -> Order {
    let header = NewOrder::for_items(
        UserId::new("u1"),
        &items,
        Some(ShippingAddress {
            street: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            ..Default::default()
        }),
        Some("ring twice".into()),
    )
    .unwrap();

    store
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let order = tx.insert_order(&header).await?;
                tx.insert_items(order.id, &items).await?;
                Ok(order.with_items(items))
            })
        })
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn insert_and_load_order_with_items() {
    let store = get_test_store().await;
    let order = persist(&store, sample_items()).await;

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.user_id.as_str(), "u1");
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.total_price, Money::from_cents(4550));
    assert_eq!(loaded.items, sample_items());
    assert_eq!(loaded.notes.as_deref(), Some("ring twice"));
    assert_eq!(
        loaded.shipping_address.unwrap().city.as_deref(),
        Some("Springfield")
    );
    assert!(loaded.reservation_id.is_none());
}

#[tokio::test]
#[serial]
async fn missing_order_returns_none() {
    let store = get_test_store().await;
    assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn failed_transaction_rolls_back_header() {
    let store = get_test_store().await;
    let items = sample_items();
    let header = NewOrder::for_items(UserId::new("u1"), &items, None, None).unwrap();

    // Inserting the same product twice violates the unique line constraint
    let mut duplicated = items.clone();
    duplicated.push(items[0].clone());

    let result = store
        .run_in_transaction(move |tx| {
            Box::pin(async move {
                let order = tx.insert_order(&header).await?;
                tx.insert_items(order.id, &duplicated).await?;
                Ok(order.id)
            })
        })
        .await;
    assert!(matches!(result, Err(OrderStoreError::Database(_))));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn items_for_unknown_order_are_rejected() {
    let store = get_test_store().await;
    let unknown = OrderId::new();

    let result = store
        .run_in_transaction(move |tx| {
            Box::pin(async move { tx.insert_items(unknown, &sample_items()).await })
        })
        .await;
    assert!(matches!(result, Err(OrderStoreError::OrderNotFound(id)) if id == unknown));
}

#[tokio::test]
#[serial]
async fn update_reservation_confirms_order() {
    let store = get_test_store().await;
    let order = persist(&store, sample_items()).await;

    let updated = store
        .update_reservation(order.id, "RES-0001", OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Confirmed);
    assert_eq!(updated.reservation_id.as_deref(), Some("RES-0001"));
    assert_eq!(updated.items.len(), 2);
    assert!(updated.updated_at >= updated.created_at);

    let again = store
        .update_reservation(order.id, "RES-0002", OrderStatus::Confirmed)
        .await;
    assert!(matches!(again, Err(OrderStoreError::Rejected { .. })));
}

#[tokio::test]
#[serial]
async fn update_reservation_on_missing_order() {
    let store = get_test_store().await;
    let result = store
        .update_reservation(OrderId::new(), "RES-0001", OrderStatus::Confirmed)
        .await;
    assert!(matches!(result, Err(OrderStoreError::OrderNotFound(_))));
}

#[tokio::test]
#[serial]
async fn delete_removes_order_and_items() {
    let store = get_test_store().await;
    let order = persist(&store, sample_items()).await;

    assert!(store.delete_order_and_items(order.id).await.unwrap());
    assert!(!store.order_exists(order.id).await.unwrap());

    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE order_id = $1")
        .bind(order.id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(items, 0);

    assert!(!store.delete_order_and_items(order.id).await.unwrap());
}
