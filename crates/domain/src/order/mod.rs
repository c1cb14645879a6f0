//! Order model and related types.

mod model;
mod request;
mod state;
mod value_objects;

pub use model::{NewOrder, Order};
pub use request::{OrderRequest, RequestedItem};
pub use state::OrderStatus;
pub use value_objects::{Money, MoneyError, OrderItem, ShippingAddress};

use common::ProductId;
use thiserror::Error;

/// Errors raised by order model invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// User ID is required.
    #[error("User ID is required")]
    UserIdRequired,

    /// Request has no items.
    #[error("Order request has no items")]
    NoItems,

    /// Invalid quantity for an item.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// The same product appears more than once in a request.
    #[error("Duplicate product in request: {product_id}")]
    DuplicateProduct { product_id: ProductId },

    /// Status transition not allowed.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Line or order total does not fit in the money range.
    #[error("Order total out of range: {0}")]
    TotalOutOfRange(#[from] MoneyError),

    /// Stored status string could not be parsed.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
