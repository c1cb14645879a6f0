use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use domain::{Money, NewOrder, Order, OrderItem, OrderStatus, ShippingAddress};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderId, OrderStoreError, Result,
    store::{OrderStore, OrderTransaction},
};

const ORDER_COLUMNS: &str = "id, user_id, total_price_cents, status, shipping_address, notes, \
                             reservation_id, created_at, updated_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| OrderStoreError::CorruptRow(e.to_string()))?;

    let shipping_address: Option<serde_json::Value> = row.try_get("shipping_address")?;
    let shipping_address = shipping_address
        .map(serde_json::from_value::<ShippingAddress>)
        .transpose()?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
        status,
        shipping_address,
        notes: row.try_get("notes")?,
        reservation_id: row.try_get("reservation_id")?,
        items: Vec::new(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i64 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| OrderStoreError::CorruptRow(format!("quantity out of range: {quantity}")))?;

    Ok(OrderItem {
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

/// Loads an order and its items over a single connection.
async fn load_order(conn: &mut PgConnection, order_id: OrderId) -> Result<Option<Order>> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let order = row_to_order(&row)?;

    let items = sqlx::query(
        r#"
        SELECT product_id, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(order_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(row_to_item)
    .collect::<Result<Vec<_>>>()?;

    Ok(Some(order.with_items(items)))
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgOrderTransaction { tx: Some(tx) }))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, order_id).await
    }

    async fn update_reservation(
        &self,
        order_id: OrderId,
        reservation_id: &str,
        status: OrderStatus,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so concurrent links observe each other's status change
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let current = current
            .ok_or(OrderStoreError::OrderNotFound(order_id))?
            .parse::<OrderStatus>()
            .map_err(|e| OrderStoreError::CorruptRow(e.to_string()))?;

        let next = current
            .transition_to(status)
            .map_err(|source| OrderStoreError::Rejected { order_id, source })?;

        sqlx::query(
            r#"
            UPDATE orders
            SET reservation_id = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(reservation_id)
        .bind(next.as_str())
        .execute(&mut *tx)
        .await?;

        let order = load_order(&mut tx, order_id)
            .await?
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        tx.commit().await?;
        Ok(order)
    }

    async fn delete_order_and_items(&self, order_id: OrderId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }
}

/// A transaction over a pooled connection.
///
/// The inner transaction is taken on commit or rollback; dropping an open
/// transaction rolls it back.
struct PgOrderTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgOrderTransaction {
    fn active(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(OrderStoreError::TransactionClosed)
    }
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order> {
        let tx = self.active()?;
        let shipping_address = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, total_price_cents, status, shipping_address, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(order.user_id.as_str())
        .bind(order.total_price.cents())
        .bind(OrderStatus::Pending.as_str())
        .bind(shipping_address)
        .bind(order.notes.as_deref())
        .fetch_one(&mut **tx)
        .await?;

        row_to_order(&row)
    }

    async fn insert_items(&mut self, order_id: OrderId, items: &[OrderItem]) -> Result<()> {
        let tx = self.active()?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("fk_order_items_order")
                {
                    return OrderStoreError::OrderNotFound(order_id);
                }
                OrderStoreError::Database(e)
            })?;
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(OrderStoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(OrderStoreError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
