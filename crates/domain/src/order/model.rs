//! Persisted order shape.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, MoneyError, OrderItem, OrderStatus, ShippingAddress};

/// An order header that has not been written yet.
///
/// The store assigns the identity and timestamps on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_price: Money,
    pub shipping_address: Option<ShippingAddress>,
    pub notes: Option<String>,
}

impl NewOrder {
    /// Builds the header for the given items, totalling their captured prices.
    ///
    /// Fails if the total does not fit in the money range.
    pub fn for_items(
        user_id: UserId,
        items: &[OrderItem],
        shipping_address: Option<ShippingAddress>,
        notes: Option<String>,
    ) -> Result<Self, MoneyError> {
        Ok(Self {
            user_id,
            total_price: Money::try_sum(items.iter().map(OrderItem::total_price))?,
            shipping_address,
            notes,
        })
    }

    /// Materializes the persisted order with the identity and time assigned by a store.
    pub fn into_order(self, id: OrderId, now: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: self.user_id,
            total_price: self.total_price,
            status: OrderStatus::Pending,
            shipping_address: self.shipping_address,
            notes: self.notes,
            reservation_id: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An order as owned by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub notes: Option<String>,
    /// Set only once the inventory reservation succeeded.
    pub reservation_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the order with its line items attached.
    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.items = items;
        self
    }

    /// Sum of captured unit prices times quantities.
    pub fn items_total(&self) -> Result<Money, MoneyError> {
        Money::try_sum(self.items.iter().map(OrderItem::total_price))
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == OrderStatus::Confirmed
    }
}
