use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::{NewOrder, Order, OrderItem, OrderStatus};
use tokio::sync::RwLock;

use crate::{
    OrderId, OrderStoreError, Result,
    store::{OrderStore, OrderTransaction},
};

#[derive(Debug, Default, Clone, Copy)]
struct FailurePoints {
    insert_order: bool,
    insert_items: bool,
    update: bool,
    delete: bool,
}

#[derive(Debug, Default)]
struct InMemoryState {
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
    failures: FailurePoints,
}

impl InMemoryState {
    fn load(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|order| {
            order
                .clone()
                .with_items(self.items.get(&order_id).cloned().unwrap_or_default())
        })
    }
}

/// In-memory order store for testing.
///
/// Transactions stage their writes and apply them under a single write lock
/// on commit, so readers never observe a header without its items.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of committed order items across all orders.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.values().map(Vec::len).sum()
    }

    /// Makes every subsequent order header insert fail.
    pub async fn set_fail_on_insert_order(&self, fail: bool) {
        self.state.write().await.failures.insert_order = fail;
    }

    /// Makes every subsequent item insert fail.
    pub async fn set_fail_on_insert_items(&self, fail: bool) {
        self.state.write().await.failures.insert_items = fail;
    }

    /// Makes every subsequent reservation update fail.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.failures.update = fail;
    }

    /// Makes every subsequent delete fail.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.failures.delete = fail;
    }

    /// Clears all orders and failure settings.
    pub async fn clear(&self) {
        *self.state.write().await = InMemoryState::default();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            staged_orders: Vec::new(),
            staged_items: Vec::new(),
            open: true,
        }))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.load(order_id))
    }

    async fn update_reservation(
        &self,
        order_id: OrderId,
        reservation_id: &str,
        status: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.failures.update {
            return Err(OrderStoreError::Unavailable(
                "update rejected by in-memory store".to_string(),
            ));
        }

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))?;

        order.status = order
            .status
            .transition_to(status)
            .map_err(|source| OrderStoreError::Rejected { order_id, source })?;
        order.reservation_id = Some(reservation_id.to_string());
        order.updated_at = Utc::now();

        state
            .load(order_id)
            .ok_or(OrderStoreError::OrderNotFound(order_id))
    }

    async fn delete_order_and_items(&self, order_id: OrderId) -> Result<bool> {
        let mut state = self.state.write().await;

        if state.failures.delete {
            return Err(OrderStoreError::Unavailable(
                "delete rejected by in-memory store".to_string(),
            ));
        }

        let removed = state.orders.remove(&order_id).is_some();
        state.items.remove(&order_id);
        Ok(removed)
    }
}

struct InMemoryTransaction {
    state: Arc<RwLock<InMemoryState>>,
    staged_orders: Vec<Order>,
    staged_items: Vec<(OrderId, Vec<OrderItem>)>,
    open: bool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(OrderStoreError::TransactionClosed)
        }
    }
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order> {
        self.ensure_open()?;

        if self.state.read().await.failures.insert_order {
            return Err(OrderStoreError::Unavailable(
                "order insert rejected by in-memory store".to_string(),
            ));
        }

        let order = order.clone().into_order(OrderId::new(), Utc::now());
        self.staged_orders.push(order.clone());
        Ok(order)
    }

    async fn insert_items(&mut self, order_id: OrderId, items: &[OrderItem]) -> Result<()> {
        self.ensure_open()?;

        let state = self.state.read().await;
        if state.failures.insert_items {
            return Err(OrderStoreError::Unavailable(
                "item insert rejected by in-memory store".to_string(),
            ));
        }

        // Foreign key: the parent must exist in this transaction or already be committed.
        let parent_known = self.staged_orders.iter().any(|o| o.id == order_id)
            || state.orders.contains_key(&order_id);
        if !parent_known {
            return Err(OrderStoreError::OrderNotFound(order_id));
        }
        drop(state);

        self.staged_items.push((order_id, items.to_vec()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.open = false;

        let mut state = self.state.write().await;
        for order in self.staged_orders.drain(..) {
            state.orders.insert(order.id, order);
        }
        for (order_id, items) in self.staged_items.drain(..) {
            state.items.entry(order_id).or_default().extend(items);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.open = false;
        self.staged_orders.clear();
        self.staged_items.clear();
        Ok(())
    }
}
