//! In-memory inventory service for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Money, RequestedItem};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{
    AvailabilityResult, InventoryClient, InventoryError, ItemReservation, ReleaseResult,
    ReservationResult,
};

/// How long a reservation holds stock before it lapses.
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(15 * 60);

/// A recorded `release` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCall {
    pub reservation_id: String,
    pub items: Vec<RequestedItem>,
}

#[derive(Debug, Clone)]
struct Product {
    unit_price: Money,
    stock: u32,
    reserved: u32,
    active: bool,
}

impl Product {
    fn available(&self) -> u32 {
        self.stock.saturating_sub(self.reserved)
    }
}

#[derive(Debug, Clone)]
struct Reservation {
    order_id: OrderId,
    items: Vec<RequestedItem>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<ProductId, Product>,
    reservations: HashMap<String, Reservation>,
    by_order: HashMap<OrderId, String>,
    next_id: u32,
    fail_on_check: bool,
    fail_on_reserve: bool,
    fail_on_release: bool,
    reject_reservations: bool,
    reserve_calls: usize,
    release_calls: Vec<ReleaseCall>,
}

/// Total quantity requested per product, so repeated lines share one stock check.
fn requested_totals(items: &[RequestedItem]) -> HashMap<&ProductId, u32> {
    let mut totals = HashMap::with_capacity(items.len());
    for item in items {
        let total = totals.entry(&item.product_id).or_insert(0u32);
        *total = total.saturating_add(item.quantity);
    }
    totals
}

impl InMemoryInventoryState {
    fn return_stock(&mut self, items: &[RequestedItem]) {
        for item in items {
            if let Some(product) = self.products.get_mut(&item.product_id) {
                product.reserved = product.reserved.saturating_sub(item.quantity);
            }
        }
    }

    fn drop_reservation(&mut self, reservation_id: &str) -> Option<Reservation> {
        let reservation = self.reservations.remove(reservation_id)?;
        self.by_order.remove(&reservation.order_id);
        self.return_stock(&reservation.items);
        Some(reservation)
    }

    /// Expires lapsed reservations, returning their stock.
    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .reservations
            .iter()
            .filter(|(_, reservation)| reservation.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for reservation_id in expired {
            tracing::info!(%reservation_id, "reservation expired");
            self.drop_reservation(&reservation_id);
        }
    }

    /// Checks one line against stock, where `requested` is the product's
    /// total over the whole request.
    fn evaluate(&self, item: &RequestedItem, requested: u32) -> ItemReservation {
        let failure = |message: String| ItemReservation {
            product_id: item.product_id.clone(),
            success: false,
            reserved_quantity: 0,
            message: Some(message),
        };

        let Some(product) = self.products.get(&item.product_id) else {
            return failure(format!("Product {} not found", item.product_id));
        };
        if !product.active {
            return failure(format!("Product {} is not active", item.product_id));
        }
        if self.reject_reservations {
            return failure("Reservation rejected".to_string());
        }
        let available = product.available();
        if available < requested {
            return failure(format!(
                "Insufficient stock. Available: {available}, Requested: {requested}"
            ));
        }

        ItemReservation {
            product_id: item.product_id.clone(),
            success: true,
            reserved_quantity: item.quantity,
            message: Some("Successfully reserved".to_string()),
        }
    }
}

/// In-memory inventory service.
///
/// Keeps a product catalog with stock and reserved counts, makes
/// all-or-nothing reservations correlated by order id and lets reservations
/// lapse after a TTL. Failure injection and call inspection are provided for
/// tests.
#[derive(Debug, Clone)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
    reservation_ttl: Duration,
}

impl Default for InMemoryInventoryService {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            reservation_ttl: DEFAULT_RESERVATION_TTL,
        }
    }
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Adds or replaces an active product.
    pub async fn add_product(&self, product_id: impl Into<ProductId>, unit_price: Money, stock: u32) {
        self.state.write().await.products.insert(
            product_id.into(),
            Product {
                unit_price,
                stock,
                reserved: 0,
                active: true,
            },
        );
    }

    pub async fn set_active(&self, product_id: &ProductId, active: bool) {
        if let Some(product) = self.state.write().await.products.get_mut(product_id) {
            product.active = active;
        }
    }

    pub async fn set_stock(&self, product_id: &ProductId, stock: u32) {
        if let Some(product) = self.state.write().await.products.get_mut(product_id) {
            product.stock = stock;
        }
    }

    /// Makes every availability check fail with a transport-style error.
    pub async fn set_fail_on_check(&self, fail: bool) {
        self.state.write().await.fail_on_check = fail;
    }

    /// Makes every reserve call fail with a transport-style error.
    pub async fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().await.fail_on_reserve = fail;
    }

    /// Makes every release call fail with a transport-style error.
    pub async fn set_fail_on_release(&self, fail: bool) {
        self.state.write().await.fail_on_release = fail;
    }

    /// Makes reserve answer `all_reserved = false` for every item.
    pub async fn set_reject_reservations(&self, reject: bool) {
        self.state.write().await.reject_reservations = reject;
    }

    /// Returns the number of live reservations.
    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    pub async fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .await
            .reservations
            .contains_key(reservation_id)
    }

    /// Returns the quantity currently held by reservations for a product.
    pub async fn reserved_quantity(&self, product_id: &ProductId) -> u32 {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map_or(0, |product| product.reserved)
    }

    /// Returns stock minus reserved quantity for a product.
    pub async fn available_quantity(&self, product_id: &ProductId) -> u32 {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map_or(0, Product::available)
    }

    pub async fn reserve_call_count(&self) -> usize {
        self.state.read().await.reserve_calls
    }

    /// Every `release` call received, in order.
    pub async fn release_calls(&self) -> Vec<ReleaseCall> {
        self.state.read().await.release_calls.clone()
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryService {
    async fn check_availability(
        &self,
        items: &[RequestedItem],
    ) -> Result<HashMap<ProductId, AvailabilityResult>, InventoryError> {
        let mut state = self.state.write().await;
        if state.fail_on_check {
            return Err(InventoryError::Unavailable(
                "availability check rejected by in-memory inventory".to_string(),
            ));
        }
        state.purge_expired(Instant::now());

        let totals = requested_totals(items);
        let results = items
            .iter()
            .map(|item| {
                let requested = totals.get(&item.product_id).copied().unwrap_or(item.quantity);
                let result = match state.products.get(&item.product_id) {
                    None => AvailabilityResult::not_found(item.product_id.clone()),
                    Some(product) => {
                        let available_quantity = product.available();
                        let available = product.active && available_quantity >= requested;
                        let message = if !product.active {
                            Some(format!("Product {} is not active", item.product_id))
                        } else if !available {
                            Some(format!(
                                "Insufficient stock. Available: {available_quantity}, Requested: {requested}"
                            ))
                        } else {
                            None
                        };
                        AvailabilityResult {
                            product_id: item.product_id.clone(),
                            available,
                            unit_price: product.unit_price,
                            is_active: product.active,
                            available_quantity,
                            message,
                        }
                    }
                };
                (item.product_id.clone(), result)
            })
            .collect();

        Ok(results)
    }

    async fn reserve(
        &self,
        items: &[RequestedItem],
        user_id: &UserId,
        order_id: OrderId,
    ) -> Result<ReservationResult, InventoryError> {
        let mut state = self.state.write().await;
        state.reserve_calls += 1;
        if state.fail_on_reserve {
            return Err(InventoryError::Unavailable(
                "reserve rejected by in-memory inventory".to_string(),
            ));
        }

        let now = Instant::now();
        state.purge_expired(now);

        // Replay of an order that already holds a reservation
        if let Some(reservation_id) = state.by_order.get(&order_id).cloned()
            && let Some(reservation) = state.reservations.get(&reservation_id)
        {
            tracing::debug!(%order_id, %reservation_id, "reservation replayed");
            return Ok(ReservationResult {
                all_reserved: true,
                reservation_id: Some(reservation_id),
                items: reservation
                    .items
                    .iter()
                    .map(|item| ItemReservation {
                        product_id: item.product_id.clone(),
                        success: true,
                        reserved_quantity: item.quantity,
                        message: Some("Successfully reserved".to_string()),
                    })
                    .collect(),
            });
        }

        let totals = requested_totals(items);
        let results: Vec<ItemReservation> = items
            .iter()
            .map(|item| {
                let requested = totals.get(&item.product_id).copied().unwrap_or(item.quantity);
                state.evaluate(item, requested)
            })
            .collect();
        let all_reserved = !results.is_empty() && results.iter().all(|r| r.success);

        if !all_reserved {
            tracing::debug!(%order_id, %user_id, "reservation refused");
            return Ok(ReservationResult {
                all_reserved: false,
                reservation_id: None,
                items: results,
            });
        }

        for item in items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.reserved = product.reserved.saturating_add(item.quantity);
            }
        }

        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state.reservations.insert(
            reservation_id.clone(),
            Reservation {
                order_id,
                items: items.to_vec(),
                expires_at: now + self.reservation_ttl,
            },
        );
        state.by_order.insert(order_id, reservation_id.clone());
        tracing::debug!(%order_id, %user_id, %reservation_id, "inventory reserved");

        Ok(ReservationResult {
            all_reserved: true,
            reservation_id: Some(reservation_id),
            items: results,
        })
    }

    async fn release(
        &self,
        reservation_id: &str,
        items: &[RequestedItem],
    ) -> Result<ReleaseResult, InventoryError> {
        let mut state = self.state.write().await;
        state.release_calls.push(ReleaseCall {
            reservation_id: reservation_id.to_string(),
            items: items.to_vec(),
        });
        if state.fail_on_release {
            return Err(InventoryError::Unavailable(
                "release rejected by in-memory inventory".to_string(),
            ));
        }
        state.purge_expired(Instant::now());

        match state.drop_reservation(reservation_id) {
            Some(_) => Ok(ReleaseResult {
                success: true,
                message: Some("Reservation released successfully".to_string()),
            }),
            None => Ok(ReleaseResult {
                success: false,
                message: Some(format!(
                    "Reservation {reservation_id} not found or already expired"
                )),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> InMemoryInventoryService {
        let inventory = InMemoryInventoryService::new();
        inventory.add_product("p1", Money::from_cents(1000), 5).await;
        inventory.add_product("p2", Money::from_cents(250), 1).await;
        inventory
    }

    fn pid(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[tokio::test]
    async fn test_availability_covers_every_requested_product() {
        let inventory = service().await;
        let results = inventory
            .check_availability(&[RequestedItem::new("p1", 2), RequestedItem::new("ghost", 1)])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let p1 = &results[&pid("p1")];
        assert!(p1.available);
        assert_eq!(p1.unit_price, Money::from_cents(1000));
        assert_eq!(p1.available_quantity, 5);

        let ghost = &results[&pid("ghost")];
        assert!(!ghost.available);
        assert_eq!(ghost.message.as_deref(), Some("Product ghost not found"));
    }

    #[tokio::test]
    async fn test_availability_reports_inactive_and_short_stock() {
        let inventory = service().await;
        inventory.set_active(&pid("p1"), false).await;

        let results = inventory
            .check_availability(&[RequestedItem::new("p1", 1), RequestedItem::new("p2", 3)])
            .await
            .unwrap();

        assert!(!results[&pid("p1")].is_active);
        assert_eq!(
            results[&pid("p2")].message.as_deref(),
            Some("Insufficient stock. Available: 1, Requested: 3")
        );
    }

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing() {
        let inventory = service().await;
        let result = inventory
            .reserve(
                &[RequestedItem::new("p1", 2), RequestedItem::new("p2", 2)],
                &UserId::new("u1"),
                OrderId::new(),
            )
            .await
            .unwrap();

        assert!(!result.all_reserved);
        assert!(result.reservation_id.is_none());
        assert!(result.items[0].success);
        assert!(!result.items[1].success);
        assert_eq!(inventory.reserved_quantity(&pid("p1")).await, 0);
        assert_eq!(inventory.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn test_repeated_lines_share_one_stock_check() {
        let inventory = service().await;
        let items = [RequestedItem::new("p1", 3), RequestedItem::new("p1", 3)];

        let availability = inventory.check_availability(&items).await.unwrap();
        assert!(!availability[&pid("p1")].available);
        assert_eq!(
            availability[&pid("p1")].message.as_deref(),
            Some("Insufficient stock. Available: 5, Requested: 6")
        );

        let result = inventory
            .reserve(&items, &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();
        assert!(!result.all_reserved);
        assert!(result.items.iter().all(|item| !item.success));
        assert_eq!(inventory.reserved_quantity(&pid("p1")).await, 0);
        assert_eq!(inventory.available_quantity(&pid("p1")).await, 5);

        let fits = [RequestedItem::new("p1", 2), RequestedItem::new("p1", 3)];
        let result = inventory
            .reserve(&fits, &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();
        assert!(result.all_reserved);
        assert_eq!(inventory.reserved_quantity(&pid("p1")).await, 5);
    }

    #[tokio::test]
    async fn test_huge_repeated_lines_do_not_overflow() {
        let inventory = InMemoryInventoryService::new();
        inventory.add_product("p1", Money::from_cents(1), u32::MAX).await;
        let items = [
            RequestedItem::new("p1", u32::MAX),
            RequestedItem::new("p1", u32::MAX),
        ];

        let result = inventory
            .reserve(&items, &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();

        assert!(!result.all_reserved);
        assert_eq!(inventory.reserved_quantity(&pid("p1")).await, 0);

        let one = [RequestedItem::new("p1", u32::MAX)];
        let result = inventory
            .reserve(&one, &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();
        assert!(result.all_reserved);
        assert_eq!(inventory.available_quantity(&pid("p1")).await, 0);
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent_per_order() {
        let inventory = service().await;
        let order_id = OrderId::new();
        let items = [RequestedItem::new("p1", 2)];
        let user = UserId::new("u1");

        let first = inventory.reserve(&items, &user, order_id).await.unwrap();
        let second = inventory.reserve(&items, &user, order_id).await.unwrap();

        assert!(first.all_reserved && second.all_reserved);
        assert_eq!(first.reservation_id.as_deref(), Some("RES-0001"));
        assert_eq!(first.reservation_id, second.reservation_id);
        assert_eq!(inventory.reserved_quantity(&pid("p1")).await, 2);
        assert_eq!(inventory.reservation_count().await, 1);
        assert_eq!(inventory.reserve_call_count().await, 2);
    }

    #[tokio::test]
    async fn test_distinct_orders_get_distinct_reservations() {
        let inventory = service().await;
        let items = [RequestedItem::new("p1", 1)];
        let user = UserId::new("u1");

        let a = inventory.reserve(&items, &user, OrderId::new()).await.unwrap();
        let b = inventory.reserve(&items, &user, OrderId::new()).await.unwrap();

        assert_ne!(a.reservation_id, b.reservation_id);
        assert_eq!(inventory.available_quantity(&pid("p1")).await, 3);
    }

    #[tokio::test]
    async fn test_release_returns_stock() {
        let inventory = service().await;
        let items = [RequestedItem::new("p1", 3)];
        let reserved = inventory
            .reserve(&items, &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();
        let reservation_id = reserved.reservation_id.unwrap();

        let released = inventory.release(&reservation_id, &items).await.unwrap();
        assert!(released.success);
        assert_eq!(inventory.available_quantity(&pid("p1")).await, 5);
        assert!(!inventory.has_reservation(&reservation_id).await);

        let again = inventory.release(&reservation_id, &items).await.unwrap();
        assert!(!again.success);
        assert_eq!(
            again.message.unwrap(),
            format!("Reservation {reservation_id} not found or already expired")
        );
        assert_eq!(inventory.release_calls().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservations_expire_after_ttl() {
        let inventory = service()
            .await
            .with_reservation_ttl(Duration::from_secs(60));
        let items = [RequestedItem::new("p1", 5)];
        let reserved = inventory
            .reserve(&items, &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();
        assert_eq!(inventory.available_quantity(&pid("p1")).await, 0);

        tokio::time::advance(Duration::from_secs(61)).await;

        // Expiry is applied lazily on the next call
        let availability = inventory.check_availability(&items).await.unwrap();
        assert!(availability[&pid("p1")].available);
        assert!(
            !inventory
                .has_reservation(reserved.reservation_id.as_deref().unwrap())
                .await
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let inventory = service().await;
        inventory.set_fail_on_check(true).await;
        inventory.set_fail_on_reserve(true).await;
        inventory.set_fail_on_release(true).await;

        let items = [RequestedItem::new("p1", 1)];
        assert!(inventory.check_availability(&items).await.is_err());
        assert!(
            inventory
                .reserve(&items, &UserId::new("u1"), OrderId::new())
                .await
                .is_err()
        );
        assert!(inventory.release("RES-0001", &items).await.is_err());
    }

    #[tokio::test]
    async fn test_rejected_reservations() {
        let inventory = service().await;
        inventory.set_reject_reservations(true).await;

        let result = inventory
            .reserve(&[RequestedItem::new("p1", 1)], &UserId::new("u1"), OrderId::new())
            .await
            .unwrap();
        assert!(!result.all_reserved);
        assert_eq!(result.items[0].message.as_deref(), Some("Reservation rejected"));
    }
}
