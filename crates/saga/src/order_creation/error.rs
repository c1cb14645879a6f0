use common::{OrderId, ProductId};
use domain::OrderError;
use order_store::OrderStoreError;
use thiserror::Error;

use super::OrderStep;
use crate::error::SagaAbort;
use crate::inventory::{InventoryError, ItemReservation};

/// The closed set of failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request cannot be fulfilled as stated; nothing was created.
    Validation,
    /// The order could not be written; nothing was committed.
    Persistence,
    /// Inventory could not be reserved; the order was deleted.
    Reservation,
    /// The reservation could not be linked; it was released and the order deleted.
    Link,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Persistence => "persistence",
            FailureKind::Reservation => "reservation",
            FailureKind::Link => "link",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested product that cannot be ordered, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableItem {
    pub product_id: ProductId,
    pub reason: String,
}

impl std::fmt::Display for UnavailableItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.product_id, self.reason)
    }
}

fn list_unavailable(items: &[UnavailableItem]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn list_reservation_failures(failures: &[ItemReservation]) -> String {
    if failures.is_empty() {
        return "no item details".to_string();
    }
    failures
        .iter()
        .map(|item| match &item.message {
            Some(message) => format!("{} ({message})", item.product_id),
            None => item.product_id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by the order creation saga.
#[derive(Debug, Error)]
pub enum OrderCreationError {
    #[error("Invalid order request: {0}")]
    InvalidRequest(#[from] OrderError),

    /// One or more requested products are unknown, inactive or out of stock.
    #[error("Items unavailable: {}", list_unavailable(.items))]
    Unavailable { items: Vec<UnavailableItem> },

    #[error("Order persistence failed: {0}")]
    Persistence(#[source] OrderStoreError),

    /// The inventory service could not reserve every item.
    #[error(
        "Inventory could not reserve all items for order {order_id}: {}",
        list_reservation_failures(.failures)
    )]
    ReservationRejected {
        order_id: OrderId,
        failures: Vec<ItemReservation>,
    },

    /// Releasing a reservation during compensation was refused.
    #[error("Release of reservation {reservation_id} was refused: {message}")]
    ReleaseRejected {
        reservation_id: String,
        message: String,
    },

    #[error("Failed to link reservation {reservation_id} to order {order_id}: {source}")]
    Link {
        order_id: OrderId,
        reservation_id: String,
        #[source]
        source: OrderStoreError,
    },

    #[error("Inventory call failed during {step}: {source}")]
    Inventory {
        step: OrderStep,
        #[source]
        source: InventoryError,
    },

    #[error(transparent)]
    Aborted(#[from] SagaAbort),
}

impl OrderCreationError {
    /// Classifies the error by the step it belongs to.
    ///
    /// The kind names where the saga stopped, not who is at fault: an
    /// inventory outage during the availability check is still
    /// `Validation`, and so is `SagaAbort::NoSteps`. Use
    /// [`is_client_error`](Self::is_client_error) to decide whether the
    /// caller's request was at fault.
    pub fn kind(&self) -> FailureKind {
        match self {
            OrderCreationError::InvalidRequest(_) | OrderCreationError::Unavailable { .. } => {
                FailureKind::Validation
            }
            OrderCreationError::Persistence(_) => FailureKind::Persistence,
            OrderCreationError::ReservationRejected { .. }
            | OrderCreationError::ReleaseRejected { .. } => FailureKind::Reservation,
            OrderCreationError::Link { .. } => FailureKind::Link,
            OrderCreationError::Inventory { step, .. } => step.failure_kind(),
            OrderCreationError::Aborted(abort) => abort
                .step()
                .and_then(OrderStep::from_name)
                .map_or(FailureKind::Validation, |step| step.failure_kind()),
        }
    }

    /// Returns true if submitting a fresh request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrderCreationError::Aborted(abort) => abort.is_timeout(),
            OrderCreationError::Inventory { source, .. } if source.is_transient() => true,
            other => other.kind() == FailureKind::Reservation,
        }
    }

    /// Returns true if the request itself was at fault and must be changed
    /// before resubmitting.
    ///
    /// Only `InvalidRequest` and `Unavailable` qualify. Transport failures,
    /// aborts and store errors are never client errors, whatever their kind.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrderCreationError::InvalidRequest(_) | OrderCreationError::Unavailable { .. }
        )
    }

    /// Products named by an `Unavailable` error, in request order.
    pub fn unavailable_products(&self) -> Vec<&ProductId> {
        match self {
            OrderCreationError::Unavailable { items } => {
                items.iter().map(|item| &item.product_id).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_unavailable_message_lists_every_item() {
        let err = OrderCreationError::Unavailable {
            items: vec![
                UnavailableItem {
                    product_id: ProductId::new("p1"),
                    reason: "out of stock".into(),
                },
                UnavailableItem {
                    product_id: ProductId::new("p3"),
                    reason: "Product p3 not found".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Items unavailable: p1 (out of stock), p3 (Product p3 not found)"
        );
        assert_eq!(err.kind(), FailureKind::Validation);
        assert!(!err.is_retryable());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_outages_during_availability_are_not_client_errors() {
        let outage = OrderCreationError::Inventory {
            step: OrderStep::CheckAvailability,
            source: InventoryError::UnexpectedStatus {
                status: 503,
                body: "down".into(),
            },
        };
        assert_eq!(outage.kind(), FailureKind::Validation);
        assert!(!outage.is_client_error());
        assert!(outage.is_retryable());

        let no_steps = OrderCreationError::from(SagaAbort::NoSteps);
        assert_eq!(no_steps.kind(), FailureKind::Validation);
        assert!(!no_steps.is_client_error());

        let invalid = OrderCreationError::from(OrderError::NoItems);
        assert!(invalid.is_client_error());

        let persistence =
            OrderCreationError::Persistence(OrderStoreError::Unavailable("down".into()));
        assert!(!persistence.is_client_error());
    }

    #[test]
    fn test_reservation_rejection_is_retryable() {
        let err = OrderCreationError::ReservationRejected {
            order_id: OrderId::new(),
            failures: vec![],
        };
        assert_eq!(err.kind(), FailureKind::Reservation);
        assert!(err.is_retryable());
        assert!(err.to_string().ends_with("no item details"));
    }

    #[test]
    fn test_aborts_take_the_kind_of_their_step() {
        let timeout = OrderCreationError::from(SagaAbort::TimedOut {
            step: "link_reservation",
            after: Duration::from_secs(1),
        });
        assert_eq!(timeout.kind(), FailureKind::Link);
        assert!(timeout.is_retryable());

        let cancelled = OrderCreationError::from(SagaAbort::Cancelled {
            step: "persist_order",
        });
        assert_eq!(cancelled.kind(), FailureKind::Persistence);
        assert!(!cancelled.is_retryable());

        assert_eq!(
            OrderCreationError::from(SagaAbort::NoSteps).kind(),
            FailureKind::Validation
        );
    }

    #[test]
    fn test_inventory_errors_take_the_kind_of_their_step() {
        let err = OrderCreationError::Inventory {
            step: OrderStep::CheckAvailability,
            source: InventoryError::Unavailable("down".into()),
        };
        assert_eq!(err.kind(), FailureKind::Validation);
        assert!(err.is_retryable());

        let err = OrderCreationError::Inventory {
            step: OrderStep::ReserveInventory,
            source: InventoryError::Decode("bad".into()),
        };
        assert_eq!(err.kind(), FailureKind::Reservation);
    }

    #[test]
    fn test_persistence_is_not_retryable() {
        let err = OrderCreationError::Persistence(OrderStoreError::Unavailable("down".into()));
        assert_eq!(err.kind(), FailureKind::Persistence);
        assert!(!err.is_retryable());
    }
}
