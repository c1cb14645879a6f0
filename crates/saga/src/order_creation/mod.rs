//! The order creation saga.
//!
//! Four steps run in a fixed order:
//! 1. Check availability (read-only)
//! 2. Persist the order and its items in one transaction
//! 3. Reserve inventory, correlated by the new order id
//! 4. Link the reservation to the order and confirm it
//!
//! If any step fails, previously completed steps are compensated in reverse
//! order: the reservation is released and the order deleted.

mod availability;
mod error;
mod link;
mod persist;
mod reserve;
mod workflow;

use std::collections::HashMap;

use common::{OrderId, ProductId};
use domain::Order;

use crate::inventory::AvailabilityResult;

pub use availability::AvailabilityStep;
pub use error::{FailureKind, OrderCreationError, UnavailableItem};
pub use link::LinkReservationStep;
pub use persist::PersistOrderStep;
pub use reserve::ReserveInventoryStep;
pub use workflow::OrderCreationWorkflow;

/// Saga type recorded in journals, logs and metrics.
pub const SAGA_TYPE: &str = "OrderCreation";

/// The steps of the order creation saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStep {
    CheckAvailability,
    PersistOrder,
    ReserveInventory,
    LinkReservation,
}

impl OrderStep {
    pub const ALL: [OrderStep; 4] = [
        OrderStep::CheckAvailability,
        OrderStep::PersistOrder,
        OrderStep::ReserveInventory,
        OrderStep::LinkReservation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OrderStep::CheckAvailability => "check_availability",
            OrderStep::PersistOrder => "persist_order",
            OrderStep::ReserveInventory => "reserve_inventory",
            OrderStep::LinkReservation => "link_reservation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.name() == name)
    }

    /// The failure class of errors raised while this step runs.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            OrderStep::CheckAvailability => FailureKind::Validation,
            OrderStep::PersistOrder => FailureKind::Persistence,
            OrderStep::ReserveInventory => FailureKind::Reservation,
            OrderStep::LinkReservation => FailureKind::Link,
        }
    }
}

impl std::fmt::Display for OrderStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output handed from one order creation step to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSagaData {
    /// Availability per requested product, with the prices to capture.
    Availability(HashMap<ProductId, AvailabilityResult>),
    /// The order as committed with status `PENDING`.
    Persisted(Order),
    /// The reservation obtained for the order.
    Reserved {
        order_id: OrderId,
        reservation_id: String,
    },
    /// The order after the reservation was linked (status `CONFIRMED`).
    Linked(Order),
}
