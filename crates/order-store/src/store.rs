use async_trait::async_trait;
use domain::{NewOrder, Order, OrderItem, OrderStatus};
use futures_util::future::BoxFuture;

use crate::{OrderId, Result};

/// A single atomic unit of order writes.
///
/// Writes become visible only after `commit`. A transaction that is rolled
/// back, or dropped without being committed, leaves no trace.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Inserts a new order header with status `PENDING`.
    ///
    /// The store assigns the order identity and timestamps.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order>;

    /// Inserts the line items of an order inserted in this transaction.
    async fn insert_items(&mut self, order_id: OrderId, items: &[OrderItem]) -> Result<()>;

    /// Makes every write of this transaction durable.
    async fn commit(&mut self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(&mut self) -> Result<()>;
}

/// Core trait for order persistence.
///
/// All implementations must be thread-safe (Send + Sync). Concurrency
/// control between independent writers is the store's responsibility.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>>;

    /// Loads an order with its items.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Attaches a reservation to an order and moves it to `status`.
    ///
    /// Fails with `Rejected` if the current status cannot transition to
    /// `status`, and with `OrderNotFound` if the order doesn't exist.
    async fn update_reservation(
        &self,
        order_id: OrderId,
        reservation_id: &str,
        status: OrderStatus,
    ) -> Result<Order>;

    /// Deletes an order and all of its items atomically.
    ///
    /// Returns false if there was nothing to delete.
    async fn delete_order_and_items(&self, order_id: OrderId) -> Result<bool>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Runs `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok`; rolls back and returns the original
    /// error otherwise. The transaction never outlives this call.
    async fn run_in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn OrderTransaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
    {
        let mut tx = self.begin().await?;
        let outcome = work(&mut *tx).await;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed transaction failed");
                }
                Err(err)
            }
        }
    }

    /// Checks if an order exists.
    async fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.get_order(order_id).await?.is_some())
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
