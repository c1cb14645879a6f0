use domain::OrderError;
use thiserror::Error;

use crate::OrderId;

/// Errors that can occur when reading or writing orders.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The write would break an order invariant (e.g. an illegal status change).
    #[error("Order {order_id} rejected update: {source}")]
    Rejected {
        order_id: OrderId,
        #[source]
        source: OrderError,
    },

    /// The transaction was already committed or rolled back.
    #[error("Transaction is no longer active")]
    TransactionClosed,

    /// A row could not be mapped back into the order model.
    #[error("Corrupt order row: {0}")]
    CorruptRow(String),

    /// The backing store is unavailable or refused the write.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
