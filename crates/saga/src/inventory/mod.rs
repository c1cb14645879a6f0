//! Inventory client contract and adapters.
//!
//! The saga talks to the remote inventory service only through
//! [`InventoryClient`]. [`InMemoryInventoryService`] is the test double and
//! [`HttpInventoryClient`] the JSON-over-HTTP adapter.

pub mod http;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Money, RequestedItem};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpInventoryClient;
pub use memory::{InMemoryInventoryService, ReleaseCall};

/// Availability of one requested product, with the price to capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub product_id: ProductId,
    pub available: bool,
    pub unit_price: Money,
    pub is_active: bool,
    pub available_quantity: u32,
    pub message: Option<String>,
}

impl AvailabilityResult {
    /// The result reported for a product the inventory does not know.
    pub fn not_found(product_id: ProductId) -> Self {
        let message = format!("Product {product_id} not found");
        Self {
            product_id,
            available: false,
            unit_price: Money::zero(),
            is_active: false,
            available_quantity: 0,
            message: Some(message),
        }
    }

    /// Returns the reason the product cannot be ordered, or `None` if it can.
    pub fn unavailable_reason(&self) -> Option<String> {
        if self.available && self.is_active {
            return None;
        }
        let fallback = if self.is_active { "unavailable" } else { "inactive" };
        Some(
            self.message
                .clone()
                .unwrap_or_else(|| fallback.to_string()),
        )
    }
}

/// Per-item outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReservation {
    pub product_id: ProductId,
    pub success: bool,
    pub reserved_quantity: u32,
    pub message: Option<String>,
}

/// Outcome of a reservation attempt.
///
/// Reservations are all-or-nothing: `reservation_id` is only present when
/// `all_reserved` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResult {
    pub all_reserved: bool,
    pub reservation_id: Option<String>,
    pub items: Vec<ItemReservation>,
}

impl ReservationResult {
    /// Items that could not be reserved.
    pub fn failures(&self) -> impl Iterator<Item = &ItemReservation> {
        self.items.iter().filter(|item| !item.success)
    }
}

/// Outcome of releasing a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub success: bool,
    pub message: Option<String>,
}

/// Errors talking to the inventory service.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The request could not be sent or its response not read.
    #[error("Inventory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Inventory service returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body did not match the contract.
    #[error("Invalid inventory response: {0}")]
    Decode(String),

    #[error("Inventory service unavailable: {0}")]
    Unavailable(String),

    /// The configured base URL cannot carry request paths.
    #[error("Invalid inventory URL: {0}")]
    InvalidUrl(String),
}

impl InventoryError {
    /// Returns true for failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            InventoryError::Http(err) => err.is_timeout() || err.is_connect(),
            InventoryError::UnexpectedStatus { status, .. } => *status >= 500,
            InventoryError::Unavailable(_) => true,
            InventoryError::Decode(_) | InventoryError::InvalidUrl(_) => false,
        }
    }
}

/// Capability contract of the remote inventory service.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Returns exactly one result per requested product, unknown products included.
    async fn check_availability(
        &self,
        items: &[RequestedItem],
    ) -> Result<HashMap<ProductId, AvailabilityResult>, InventoryError>;

    /// Reserves all items or none.
    ///
    /// Idempotent per `order_id`: repeating a call for the same order
    /// returns the original reservation instead of reserving twice.
    async fn reserve(
        &self,
        items: &[RequestedItem],
        user_id: &UserId,
        order_id: OrderId,
    ) -> Result<ReservationResult, InventoryError>;

    /// Releases a reservation, returning its stock.
    async fn release(
        &self,
        reservation_id: &str,
        items: &[RequestedItem],
    ) -> Result<ReleaseResult, InventoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_result() {
        let result = AvailabilityResult::not_found(ProductId::new("p9"));
        assert!(!result.available);
        assert_eq!(
            result.unavailable_reason().as_deref(),
            Some("Product p9 not found")
        );
    }

    #[test]
    fn test_unavailable_reason_prefers_message() {
        let mut result = AvailabilityResult {
            product_id: ProductId::new("p1"),
            available: false,
            unit_price: Money::from_cents(1000),
            is_active: true,
            available_quantity: 0,
            message: Some("out of stock".into()),
        };
        assert_eq!(result.unavailable_reason().as_deref(), Some("out of stock"));

        result.message = None;
        assert_eq!(result.unavailable_reason().as_deref(), Some("unavailable"));

        result.available = true;
        result.is_active = false;
        assert_eq!(result.unavailable_reason().as_deref(), Some("inactive"));

        result.is_active = true;
        assert_eq!(result.unavailable_reason(), None);
    }

    #[test]
    fn test_reservation_failures() {
        let result = ReservationResult {
            all_reserved: false,
            reservation_id: None,
            items: vec![
                ItemReservation {
                    product_id: ProductId::new("p1"),
                    success: true,
                    reserved_quantity: 1,
                    message: None,
                },
                ItemReservation {
                    product_id: ProductId::new("p2"),
                    success: false,
                    reserved_quantity: 0,
                    message: Some("Insufficient stock. Available: 0, Requested: 1".into()),
                },
            ],
        };
        let failed: Vec<_> = result.failures().map(|i| i.product_id.as_str()).collect();
        assert_eq!(failed, vec!["p2"]);
    }

    #[test]
    fn test_transient_classification() {
        assert!(InventoryError::Unavailable("down".into()).is_transient());
        assert!(
            InventoryError::UnexpectedStatus {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !InventoryError::UnexpectedStatus {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!InventoryError::Decode("bad".into()).is_transient());
        assert!(!InventoryError::InvalidUrl("mailto:x".into()).is_transient());
    }
}
